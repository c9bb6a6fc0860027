//! Protocol constants: command codes, attribute codes, vendor and enum values.

/// Protocol version carried in every packet header.
pub const VERSION: u8 = 1;

/// Application id stamped on requests by default.
pub const APP_ID: u32 = 0x0001_0003;

/// Vendor ids.
pub mod vendor {
    /// Enterprise number used for all dmconfig-private attributes.
    pub const TRAVELPING: u32 = 18681;
}

/// Command codes.
///
/// Codes below [`CLIENT_ACTIVE_NOTIFY`] are sent by the client; the `CLIENT_*`
/// codes are server-initiated requests carrying feedback.
pub mod command {
    pub const START_SESSION: u32 = 16;
    pub const SWITCH_SESSION: u32 = 17;
    pub const END_SESSION: u32 = 18;
    pub const SESSION_INFO: u32 = 19;
    pub const CFG_SESSION_INFO: u32 = 20;

    pub const SUBSCRIBE_NOTIFY: u32 = 24;
    pub const UNSUBSCRIBE_NOTIFY: u32 = 25;
    pub const PARAM_NOTIFY: u32 = 26;
    pub const RECURSIVE_PARAM_NOTIFY: u32 = 27;
    pub const GET_PASSIVE_NOTIFICATIONS: u32 = 28;
    pub const SUBSCRIBE_GW_NOTIFY: u32 = 29;
    pub const UNSUBSCRIBE_GW_NOTIFY: u32 = 30;

    pub const DB_ADD_INSTANCE: u32 = 32;
    pub const DB_DEL_INSTANCE: u32 = 33;
    pub const DB_SET: u32 = 34;
    pub const DB_GET: u32 = 35;
    pub const DB_LIST: u32 = 36;
    pub const DB_RETRIEVE_ENUMS: u32 = 37;
    pub const DB_COMMIT: u32 = 38;
    pub const DB_CANCEL: u32 = 39;
    pub const DB_SAVE: u32 = 40;
    pub const DB_DUMP: u32 = 41;
    pub const DB_FIND_INSTANCE: u32 = 42;

    pub const DEV_CONF_SAVE: u32 = 48;
    pub const DEV_CONF_RESTORE: u32 = 49;
    pub const DEV_FWUPDATE: u32 = 50;
    pub const DEV_PING: u32 = 51;
    pub const DEV_TRACEROUTE: u32 = 52;
    pub const DEV_PCAP: u32 = 53;
    pub const DEV_HOTPLUG: u32 = 54;

    pub const GW_GET_CLIENT: u32 = 64;
    pub const GW_GET_ALL_CLIENTS: u32 = 65;
    pub const GW_CLIENT_REQ_ACCESSCLASS: u32 = 66;
    pub const GW_CLIENT_SET_ACCESSCLASS: u32 = 67;
    pub const GW_SOL_INFORM: u32 = 68;

    pub const CLIENT_ACTIVE_NOTIFY: u32 = 80;
    pub const CLIENT_GATEWAY_NOTIFY: u32 = 81;
    pub const CLIENT_FWUPDATE_FINISH: u32 = 82;
    pub const CLIENT_FWUPDATE_PROGRESS: u32 = 83;
    pub const CLIENT_PING: u32 = 84;
    pub const CLIENT_PING_COMPLETED: u32 = 85;
    pub const CLIENT_TRACEROUTE: u32 = 86;
    pub const CLIENT_TRACEROUTE_COMPLETED: u32 = 87;
    pub const CLIENT_PCAP_ABORTED: u32 = 88;

    /// Human-readable command name for logs.
    pub fn name(code: u32) -> &'static str {
        match code {
            START_SESSION => "START_SESSION",
            SWITCH_SESSION => "SWITCH_SESSION",
            END_SESSION => "END_SESSION",
            SESSION_INFO => "SESSION_INFO",
            CFG_SESSION_INFO => "CFG_SESSION_INFO",
            SUBSCRIBE_NOTIFY => "SUBSCRIBE_NOTIFY",
            UNSUBSCRIBE_NOTIFY => "UNSUBSCRIBE_NOTIFY",
            PARAM_NOTIFY => "PARAM_NOTIFY",
            RECURSIVE_PARAM_NOTIFY => "RECURSIVE_PARAM_NOTIFY",
            GET_PASSIVE_NOTIFICATIONS => "GET_PASSIVE_NOTIFICATIONS",
            SUBSCRIBE_GW_NOTIFY => "SUBSCRIBE_GW_NOTIFY",
            UNSUBSCRIBE_GW_NOTIFY => "UNSUBSCRIBE_GW_NOTIFY",
            DB_ADD_INSTANCE => "DB_ADD_INSTANCE",
            DB_DEL_INSTANCE => "DB_DEL_INSTANCE",
            DB_SET => "DB_SET",
            DB_GET => "DB_GET",
            DB_LIST => "DB_LIST",
            DB_RETRIEVE_ENUMS => "DB_RETRIEVE_ENUMS",
            DB_COMMIT => "DB_COMMIT",
            DB_CANCEL => "DB_CANCEL",
            DB_SAVE => "DB_SAVE",
            DB_DUMP => "DB_DUMP",
            DB_FIND_INSTANCE => "DB_FIND_INSTANCE",
            DEV_CONF_SAVE => "DEV_CONF_SAVE",
            DEV_CONF_RESTORE => "DEV_CONF_RESTORE",
            DEV_FWUPDATE => "DEV_FWUPDATE",
            DEV_PING => "DEV_PING",
            DEV_TRACEROUTE => "DEV_TRACEROUTE",
            DEV_PCAP => "DEV_PCAP",
            DEV_HOTPLUG => "DEV_HOTPLUG",
            GW_GET_CLIENT => "GW_GET_CLIENT",
            GW_GET_ALL_CLIENTS => "GW_GET_ALL_CLIENTS",
            GW_CLIENT_REQ_ACCESSCLASS => "GW_CLIENT_REQ_ACCESSCLASS",
            GW_CLIENT_SET_ACCESSCLASS => "GW_CLIENT_SET_ACCESSCLASS",
            GW_SOL_INFORM => "GW_SOL_INFORM",
            CLIENT_ACTIVE_NOTIFY => "CLIENT_ACTIVE_NOTIFY",
            CLIENT_GATEWAY_NOTIFY => "CLIENT_GATEWAY_NOTIFY",
            CLIENT_FWUPDATE_FINISH => "CLIENT_FWUPDATE_FINISH",
            CLIENT_FWUPDATE_PROGRESS => "CLIENT_FWUPDATE_PROGRESS",
            CLIENT_PING => "CLIENT_PING",
            CLIENT_PING_COMPLETED => "CLIENT_PING_COMPLETED",
            CLIENT_TRACEROUTE => "CLIENT_TRACEROUTE",
            CLIENT_TRACEROUTE_COMPLETED => "CLIENT_TRACEROUTE_COMPLETED",
            CLIENT_PCAP_ABORTED => "CLIENT_PCAP_ABORTED",
            _ => "UNKNOWN",
        }
    }
}

/// Attribute codes.
///
/// The value-type codes (`BOOL` .. `UINT16`) double as type tags: a typed value
/// is carried in an attribute whose code names its type.
pub mod avp {
    pub const BOOL: u32 = 1;
    pub const ENUMID: u32 = 2;
    pub const INT32: u32 = 3;
    pub const COUNTER: u32 = 4;
    pub const UINT32: u32 = 5;
    pub const ABSTICKS: u32 = 6;
    pub const RELTICKS: u32 = 7;
    pub const INT64: u32 = 8;
    pub const UINT64: u32 = 9;
    pub const ENUM: u32 = 10;
    pub const PATH: u32 = 11;
    pub const STRING: u32 = 12;
    pub const BINARY: u32 = 13;
    pub const ADDRESS: u32 = 14;
    pub const DATE: u32 = 15;
    pub const UINT8: u32 = 16;
    pub const UINT16: u32 = 17;
    /// Placeholder type used when requesting values of unknown type.
    pub const UNKNOWN: u32 = 18;

    pub const RC: u32 = 32;
    pub const SESSIONID: u32 = 33;
    pub const CONTAINER: u32 = 34;
    pub const TYPE_PATH: u32 = 35;
    pub const TIMEOUT_SESSION: u32 = 36;
    pub const TIMEOUT_REQUEST: u32 = 37;
    pub const NOTIFY_TYPE: u32 = 38;
    pub const NODE_NAME: u32 = 39;
    pub const NODE_TYPE: u32 = 40;
    pub const NODE_DATATYPE: u32 = 41;
    pub const NODE_SIZE: u32 = 42;
    pub const HOTPLUGCMD: u32 = 43;
    pub const FWUPDATE_STEP: u32 = 44;

    pub const GW_NATIPADDRESS: u32 = 48;
    pub const GW_IPADDRESS: u32 = 49;
    pub const GW_PORT: u32 = 50;
    pub const GW_OBJ_ID: u32 = 51;
    pub const GW_USERNAME: u32 = 52;
    pub const GW_PASSWORD: u32 = 53;
    pub const GW_ACCESSCLASS: u32 = 54;
    pub const GW_USERAGENT: u32 = 55;
    pub const GW_SESSIONTIMEOUT: u32 = 56;
    pub const GW_ZONE: u32 = 57;
    /// Access-class lifetime; distinct from the gateway session timeout.
    pub const GW_TIMEOUT: u32 = 58;
}

/// Session flags for `START_SESSION`.
pub mod session {
    pub const READ: u32 = 1 << 0;
    pub const WRITE: u32 = 1 << 1;
    pub const EXCLUSIVE: u32 = 1 << 2;
    pub const CONFIGURE: u32 = 1 << 3;
}

/// `NOTIFY_TYPE` values in active and passive notifications.
pub mod notify {
    pub const NOTHING: u32 = 0;
    pub const PARAMETER_CHANGED: u32 = 1;
    pub const INSTANCE_CREATED: u32 = 2;
    pub const INSTANCE_DELETED: u32 = 3;
}

/// `NODE_TYPE` values in list answers.
pub mod node {
    pub const PARAMETER: u32 = 0;
    pub const TABLE: u32 = 1;
    pub const OBJECT: u32 = 2;
    pub const INSTANCE: u32 = 3;
}
