//! Events pushed by the server.

use std::net::IpAddr;

use crate::avp::AvpCursor;
use crate::codes::command;

/// Configuration-change notification (active or gateway).
#[derive(Debug, Clone, Default)]
pub struct Notification {
    /// Whether this arrived as a gateway notification.
    pub gateway: bool,
    /// Notification body; see [`decode_notifications`](crate::decode::decode_notifications).
    pub group: AvpCursor,
}

/// Firmware update finished (or reached an intermediate end state).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareFinish {
    pub code: i32,
    pub message: String,
}

impl FirmwareFinish {
    /// Code the server sends when the update process is over.
    pub const FINAL_CODE: i32 = -1;
}

/// Firmware update progress report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareProgress {
    pub message: String,
    pub state: u32,
    pub current: i32,
    pub total: i32,
    pub unit: String,
}

/// One ping reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingSample {
    pub bytes: u32,
    pub address: Option<IpAddr>,
    pub sequence: u16,
    /// Round-trip time in milliseconds.
    pub rtt: u32,
}

/// Ping statistics, sent once when the run is over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingSummary {
    pub succeeded: u32,
    pub failed: u32,
    pub avg: u32,
    pub min: u32,
    pub max: u32,
}

/// One traceroute hop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracerouteHop {
    pub code: i32,
    pub hop: u8,
    /// Reverse-resolved name; `None` when the server sent an empty string.
    pub hostname: Option<String>,
    pub address: Option<IpAddr>,
    pub time: i32,
}

/// Traceroute finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracerouteSummary {
    pub code: i32,
}

/// Packet capture stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcapAborted {
    pub code: u32,
}

/// An unsolicited server event.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum FeedbackEvent {
    Notification(Notification),
    FirmwareFinish(FirmwareFinish),
    FirmwareProgress(FirmwareProgress),
    PingSample(PingSample),
    PingCompleted(PingSummary),
    TracerouteHop(TracerouteHop),
    TracerouteCompleted(TracerouteSummary),
    PcapAborted(PcapAborted),
}

impl FeedbackEvent {
    /// Server command code that carries this event.
    pub fn command(&self) -> u32 {
        match self {
            Self::Notification(n) if n.gateway => command::CLIENT_GATEWAY_NOTIFY,
            Self::Notification(_) => command::CLIENT_ACTIVE_NOTIFY,
            Self::FirmwareFinish(_) => command::CLIENT_FWUPDATE_FINISH,
            Self::FirmwareProgress(_) => command::CLIENT_FWUPDATE_PROGRESS,
            Self::PingSample(_) => command::CLIENT_PING,
            Self::PingCompleted(_) => command::CLIENT_PING_COMPLETED,
            Self::TracerouteHop(_) => command::CLIENT_TRACEROUTE,
            Self::TracerouteCompleted(_) => command::CLIENT_TRACEROUTE_COMPLETED,
            Self::PcapAborted(_) => command::CLIENT_PCAP_ABORTED,
        }
    }

    /// Whether this event ends the feature's run, releasing its slot.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::FirmwareFinish(f) => f.code == FirmwareFinish::FINAL_CODE,
            Self::PingCompleted(_) | Self::TracerouteCompleted(_) | Self::PcapAborted(_) => true,
            Self::Notification(_)
            | Self::FirmwareProgress(_)
            | Self::PingSample(_)
            | Self::TracerouteHop(_) => false,
        }
    }
}
