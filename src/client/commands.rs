//! Request payload constructors.
//!
//! Each constructor yields the command code plus the group that goes inside
//! the request's container attribute. All attributes are vendor-scoped.

use std::net::IpAddr;
use std::time::Duration;

use crate::avp::{AvpGroup, AvpWrite};
use crate::codes::{avp, command};
use crate::error::Result;
use crate::value::{Value, ValueType};

/// A request ready to be registered on a [`Connection`](super::Connection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub code: u32,
    /// Group wrapped in the container attribute; `None` sends no container.
    pub body: Option<AvpGroup>,
}

/// Parameters of a gateway access-class request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessClassRequest {
    /// Object path of the client entry.
    pub path: String,
    pub username: String,
    pub password: String,
    pub access_class: String,
    pub user_agent: Option<String>,
    pub timeout: Option<Duration>,
}

impl Request {
    /// A request without body.
    pub fn new(code: u32) -> Self {
        Self { code, body: None }
    }

    /// A request whose body is filled by `fill`.
    pub fn with_body<F>(code: u32, fill: F) -> Result<Self>
    where
        F: FnOnce(&mut AvpGroup) -> Result<()>,
    {
        let mut body = AvpGroup::new();
        fill(&mut body)?;
        Ok(Self {
            code,
            body: Some(body),
        })
    }

    fn path(code: u32, path: &str) -> Result<Self> {
        Self::with_body(code, |g| g.put_str(avp::PATH, path))
    }

    fn string(code: u32, value: &str) -> Result<Self> {
        Self::with_body(code, |g| g.put_str(avp::STRING, value))
    }

    fn session(code: u32, flags: u32, session_timeout: Option<Duration>, request_timeout: Option<Duration>) -> Result<Self> {
        Self::with_body(code, |g| {
            g.put_u32(avp::UINT32, flags)?;
            if let Some(t) = session_timeout {
                g.put_timeval(avp::TIMEOUT_SESSION, t)?;
            }
            if let Some(t) = request_timeout {
                g.put_timeval(avp::TIMEOUT_REQUEST, t)?;
            }
            Ok(())
        })
    }

    fn toggle(code: u32, enabled: bool, inner: &AvpGroup) -> Result<Self> {
        Self::with_body(code, |g| {
            g.put_bool(avp::BOOL, enabled)?;
            g.put_group(avp::CONTAINER, inner)
        })
    }

    // Sessions

    pub fn start_session(flags: u32, session_timeout: Option<Duration>, request_timeout: Option<Duration>) -> Result<Self> {
        Self::session(command::START_SESSION, flags, session_timeout, request_timeout)
    }

    pub fn switch_session(flags: u32, session_timeout: Option<Duration>, request_timeout: Option<Duration>) -> Result<Self> {
        Self::session(command::SWITCH_SESSION, flags, session_timeout, request_timeout)
    }

    pub fn end_session() -> Self {
        Self::new(command::END_SESSION)
    }

    pub fn session_info() -> Self {
        Self::new(command::SESSION_INFO)
    }

    pub fn cfg_session_info() -> Self {
        Self::new(command::CFG_SESSION_INFO)
    }

    // Database

    /// Read parameters; each entry names the expected type and the path.
    pub fn get(params: &[(ValueType, &str)]) -> Result<Self> {
        Self::with_body(command::DB_GET, |g| {
            params
                .iter()
                .try_for_each(|(ty, path)| g.put_u32_string(avp::TYPE_PATH, ty.code(), path))
        })
    }

    /// Write parameters, one `CONTAINER { PATH, value }` per pair.
    pub fn set(params: &[(&str, Value)]) -> Result<Self> {
        Self::with_body(command::DB_SET, |g| {
            for (path, value) in params {
                let mut pair = AvpGroup::new();
                pair.put_str(avp::PATH, path)?;
                value.encode(&mut pair)?;
                g.put_group(avp::CONTAINER, &pair)?;
            }
            Ok(())
        })
    }

    /// List the children of `path`, `level` levels deep (0 = unlimited).
    pub fn list(path: &str, level: u16) -> Result<Self> {
        Self::with_body(command::DB_LIST, |g| {
            g.put_u16(avp::UINT16, level)?;
            g.put_str(avp::PATH, path)
        })
    }

    /// Create an instance of the table at `path`; `id` 0 lets the server pick.
    pub fn add_instance(path: &str, id: u16) -> Result<Self> {
        Self::with_body(command::DB_ADD_INSTANCE, |g| {
            g.put_str(avp::PATH, path)?;
            g.put_u16(avp::UINT16, id)
        })
    }

    pub fn del_instance(path: &str) -> Result<Self> {
        Self::path(command::DB_DEL_INSTANCE, path)
    }

    /// Find the instance of table `path` whose parameter `param` equals `value`.
    pub fn find_instance(path: &str, param: &str, value: &Value) -> Result<Self> {
        Self::with_body(command::DB_FIND_INSTANCE, |g| {
            g.put_str(avp::PATH, path)?;
            g.put_str(avp::PATH, param)?;
            value.encode(g)
        })
    }

    pub fn commit() -> Self {
        Self::new(command::DB_COMMIT)
    }

    pub fn cancel() -> Self {
        Self::new(command::DB_CANCEL)
    }

    pub fn save() -> Self {
        Self::new(command::DB_SAVE)
    }

    pub fn dump(path: &str) -> Result<Self> {
        Self::path(command::DB_DUMP, path)
    }

    pub fn retrieve_enums(path: &str) -> Result<Self> {
        Self::path(command::DB_RETRIEVE_ENUMS, path)
    }

    // Notifications

    pub fn subscribe_notify() -> Self {
        Self::new(command::SUBSCRIBE_NOTIFY)
    }

    pub fn subscribe_gw_notify() -> Self {
        Self::new(command::SUBSCRIBE_GW_NOTIFY)
    }

    pub fn unsubscribe_notify() -> Self {
        Self::new(command::UNSUBSCRIBE_NOTIFY)
    }

    pub fn unsubscribe_gw_notify() -> Self {
        Self::new(command::UNSUBSCRIBE_GW_NOTIFY)
    }

    /// Enable or disable active notification for each of `paths`.
    pub fn param_notify(enabled: bool, paths: &[&str]) -> Result<Self> {
        let mut inner = AvpGroup::new();
        for path in paths {
            inner.put_str(avp::PATH, path)?;
        }
        Self::toggle(command::PARAM_NOTIFY, enabled, &inner)
    }

    /// Enable or disable active notification for everything below `path`.
    pub fn recursive_param_notify(enabled: bool, path: &str) -> Result<Self> {
        let mut inner = AvpGroup::new();
        inner.put_str(avp::PATH, path)?;
        Self::toggle(command::RECURSIVE_PARAM_NOTIFY, enabled, &inner)
    }

    pub fn get_passive_notifications() -> Self {
        Self::new(command::GET_PASSIVE_NOTIFICATIONS)
    }

    // Gateway

    /// Look up a client by address; `nat` selects the translated address.
    pub fn gw_get_client(zone: u16, nat: bool, addr: IpAddr, port: u16) -> Result<Self> {
        Self::with_body(command::GW_GET_CLIENT, |g| {
            g.put_u16(avp::UINT16, zone)?;
            let code = if nat {
                avp::GW_NATIPADDRESS
            } else {
                avp::GW_IPADDRESS
            };
            g.put_address(code, addr)?;
            g.put_u16(avp::UINT16, port)
        })
    }

    pub fn gw_get_all_clients(zone: u16) -> Result<Self> {
        Self::with_body(command::GW_GET_ALL_CLIENTS, |g| g.put_u16(avp::UINT16, zone))
    }

    pub fn gw_req_client_accessclass(req: &AccessClassRequest) -> Result<Self> {
        Self::with_body(command::GW_CLIENT_REQ_ACCESSCLASS, |g| {
            g.put_str(avp::GW_OBJ_ID, &req.path)?;
            g.put_str(avp::GW_USERNAME, &req.username)?;
            g.put_str(avp::GW_PASSWORD, &req.password)?;
            g.put_str(avp::GW_ACCESSCLASS, &req.access_class)?;
            if let Some(agent) = &req.user_agent {
                g.put_str(avp::GW_USERAGENT, agent)?;
            }
            if let Some(timeout) = req.timeout {
                g.put_timeval(avp::GW_TIMEOUT, timeout)?;
            }
            Ok(())
        })
    }

    pub fn gw_set_client_accessclass(path: &str, username: Option<&str>, access_class: &str) -> Result<Self> {
        Self::with_body(command::GW_CLIENT_SET_ACCESSCLASS, |g| {
            g.put_str(avp::GW_OBJ_ID, path)?;
            if let Some(username) = username {
                g.put_str(avp::GW_USERNAME, username)?;
            }
            g.put_str(avp::GW_ACCESSCLASS, access_class)
        })
    }

    pub fn gw_sol_inform(zone: u16, access_class: u16, addr: IpAddr, mac: &str) -> Result<Self> {
        Self::with_body(command::GW_SOL_INFORM, |g| {
            g.put_u16(avp::UINT16, zone)?;
            g.put_u16(avp::UINT16, access_class)?;
            g.put_address(avp::ADDRESS, addr)?;
            g.put_str(avp::STRING, mac)
        })
    }

    // Device

    pub fn hotplug(cmd: &str) -> Result<Self> {
        Self::with_body(command::DEV_HOTPLUG, |g| g.put_str(avp::HOTPLUGCMD, cmd))
    }

    pub fn conf_save(server: &str) -> Result<Self> {
        Self::string(command::DEV_CONF_SAVE, server)
    }

    pub fn conf_restore(server: &str) -> Result<Self> {
        Self::string(command::DEV_CONF_RESTORE, server)
    }

    pub fn fwupdate(file: &str, device: &str, flags: u32) -> Result<Self> {
        Self::with_body(command::DEV_FWUPDATE, |g| {
            g.put_str(avp::STRING, file)?;
            g.put_str(avp::STRING, device)?;
            g.put_u32(avp::UINT32, flags)
        })
    }

    /// Ping `host` `count` times; `timeout` is per probe in milliseconds.
    pub fn ping(host: &str, count: u32, timeout: u32) -> Result<Self> {
        Self::with_body(command::DEV_PING, |g| {
            g.put_str(avp::STRING, host)?;
            g.put_u32(avp::UINT32, count)?;
            g.put_u32(avp::UINT32, timeout)
        })
    }

    pub fn traceroute(host: &str, tries: u8, timeout: u32, size: u16, max_hop: u8) -> Result<Self> {
        Self::with_body(command::DEV_TRACEROUTE, |g| {
            g.put_str(avp::STRING, host)?;
            g.put_u8(avp::UINT8, tries)?;
            g.put_u32(avp::UINT32, timeout)?;
            g.put_u16(avp::UINT16, size)?;
            g.put_u8(avp::UINT8, max_hop)
        })
    }

    /// Capture on `interface` and upload to `url`; stops at the first limit hit.
    pub fn pcap(interface: &str, url: &str, timeout: u32, packets: u16, kbytes: u16) -> Result<Self> {
        Self::with_body(command::DEV_PCAP, |g| {
            g.put_str(avp::PATH, interface)?;
            g.put_str(avp::STRING, url)?;
            g.put_u32(avp::UINT32, timeout)?;
            g.put_u16(avp::UINT16, packets)?;
            g.put_u16(avp::UINT16, kbytes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::vendor;
    use std::net::Ipv4Addr;

    fn body(req: &Request) -> crate::avp::AvpCursor {
        req.body.as_ref().unwrap().cursor()
    }

    #[test]
    fn test_start_session_optional_timeouts() {
        let req = Request::start_session(3, None, Some(Duration::from_millis(1500))).unwrap();
        assert_eq!(req.code, command::START_SESSION);
        let mut g = body(&req);
        assert_eq!(g.expect(avp::UINT32).unwrap().as_u32().unwrap(), 3);
        assert_eq!(
            g.expect(avp::TIMEOUT_REQUEST).unwrap().as_timeval().unwrap(),
            Duration::from_millis(1500)
        );
        g.assert_end().unwrap();
    }

    #[test]
    fn test_get_uses_typed_paths() {
        let req = Request::get(&[(ValueType::UInt32, "A.b"), (ValueType::String, "A.c")]).unwrap();
        let mut g = body(&req);
        let first = g.expect(avp::TYPE_PATH).unwrap();
        assert_eq!(first.vendor_id, Some(vendor::TRAVELPING));
        assert_eq!(first.as_u32_string().unwrap(), (avp::UINT32, "A.b"));
        assert_eq!(
            g.expect(avp::TYPE_PATH).unwrap().as_u32_string().unwrap(),
            (avp::STRING, "A.c")
        );
        g.assert_end().unwrap();
    }

    #[test]
    fn test_set_wraps_each_pair() {
        let req = Request::set(&[("A.b", Value::UInt32(7)), ("A.c", Value::Bool(true))]).unwrap();
        let mut g = body(&req);
        let mut pair = g.expect(avp::CONTAINER).unwrap().as_group();
        assert_eq!(pair.expect(avp::PATH).unwrap().as_str().unwrap(), "A.b");
        assert_eq!(pair.expect(avp::UINT32).unwrap().as_u32().unwrap(), 7);
        pair.assert_end().unwrap();
        let mut pair = g.expect(avp::CONTAINER).unwrap().as_group();
        assert_eq!(pair.expect(avp::PATH).unwrap().as_str().unwrap(), "A.c");
        assert!(pair.expect(avp::BOOL).unwrap().as_bool().unwrap());
        g.assert_end().unwrap();
    }

    #[test]
    fn test_param_notify_layout() {
        let req = Request::param_notify(true, &["A.x", "A.y"]).unwrap();
        let mut g = body(&req);
        assert_eq!(g.expect(avp::BOOL).unwrap().as_u8().unwrap(), 1);
        let mut inner = g.expect(avp::CONTAINER).unwrap().as_group();
        assert_eq!(inner.expect(avp::PATH).unwrap().as_str().unwrap(), "A.x");
        assert_eq!(inner.expect(avp::PATH).unwrap().as_str().unwrap(), "A.y");
        inner.assert_end().unwrap();
    }

    #[test]
    fn test_gw_get_client_address_code() {
        let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        for (nat, code) in [(true, avp::GW_NATIPADDRESS), (false, avp::GW_IPADDRESS)] {
            let req = Request::gw_get_client(2, nat, addr, 8080).unwrap();
            let mut g = body(&req);
            assert_eq!(g.expect(avp::UINT16).unwrap().as_u16().unwrap(), 2);
            assert_eq!(g.expect(code).unwrap().as_address().unwrap(), addr);
            assert_eq!(g.expect(avp::UINT16).unwrap().as_u16().unwrap(), 8080);
        }
    }

    #[test]
    fn test_accessclass_optional_fields() {
        let req = Request::gw_req_client_accessclass(&AccessClassRequest {
            path: "GW.Client.1".into(),
            username: "u".into(),
            password: "p".into(),
            access_class: "guest".into(),
            ..Default::default()
        })
        .unwrap();
        let mut g = body(&req);
        for code in [avp::GW_OBJ_ID, avp::GW_USERNAME, avp::GW_PASSWORD, avp::GW_ACCESSCLASS] {
            g.expect(code).unwrap();
        }
        g.assert_end().unwrap();
    }

    #[test]
    fn test_accessclass_timeout_attribute() {
        let req = Request::gw_req_client_accessclass(&AccessClassRequest {
            path: "GW.Client.1".into(),
            username: "u".into(),
            password: "p".into(),
            access_class: "guest".into(),
            user_agent: Some("curl".into()),
            timeout: Some(Duration::from_secs(90)),
        })
        .unwrap();
        let mut g = body(&req);
        for code in [avp::GW_OBJ_ID, avp::GW_USERNAME, avp::GW_PASSWORD, avp::GW_ACCESSCLASS] {
            g.expect(code).unwrap();
        }
        assert_eq!(g.expect(avp::GW_USERAGENT).unwrap().as_str().unwrap(), "curl");
        let timeout = g.take_avp().unwrap();
        assert_eq!(timeout.code, avp::GW_TIMEOUT);
        assert_ne!(timeout.code, avp::GW_SESSIONTIMEOUT);
        assert_eq!(timeout.as_timeval().unwrap(), Duration::from_secs(90));
        g.assert_end().unwrap();
    }

    #[test]
    fn test_traceroute_widths() {
        let req = Request::traceroute("example.org", 3, 2000, 64, 30).unwrap();
        let mut g = body(&req);
        g.expect(avp::STRING).unwrap();
        assert_eq!(g.expect(avp::UINT8).unwrap().as_u8().unwrap(), 3);
        assert_eq!(g.expect(avp::UINT32).unwrap().as_u32().unwrap(), 2000);
        assert_eq!(g.expect(avp::UINT16).unwrap().as_u16().unwrap(), 64);
        assert_eq!(g.expect(avp::UINT8).unwrap().as_u8().unwrap(), 30);
        g.assert_end().unwrap();
    }

    #[test]
    fn test_bodiless_commands() {
        for req in [Request::commit(), Request::end_session(), Request::subscribe_notify()] {
            assert!(req.body.is_none());
        }
    }
}
