//! Feedback channels for server-pushed events.
//!
//! Some commands start a process on the server that reports back through
//! unsolicited packets: subscribing to notifications, firmware updates, ping,
//! traceroute and packet capture. Each such [`Feature`] owns at most one
//! callback in the connection's [`FeedbackRegistry`]. The callback receives
//! every event of its feature as a [`Feedback`].
//!
//! A slot is released when its feature sends a terminal event (ping and
//! traceroute completion, pcap abort, firmware finish with code -1), when the
//! starting command fails, or when the session ends.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_dmconfig::Connection;
//! use async_dmconfig::notification::FeedbackEvent;
//!
//! # async fn example(conn: &mut Connection) -> async_dmconfig::Result<()> {
//! conn.ping("192.0.2.1", 3, 1000, |feedback| match feedback.event {
//!     FeedbackEvent::PingSample(sample) => println!("reply seq={} rtt={}ms", sample.sequence, sample.rtt),
//!     FeedbackEvent::PingCompleted(summary) => println!("{} ok, {} lost", summary.succeeded, summary.failed),
//!     _ => {}
//! })
//! .await?;
//! // Drive the connection until the run completes.
//! conn.run().await?;
//! # Ok(())
//! # }
//! ```

mod handlers;
mod types;

use std::collections::HashMap;
use std::fmt;

use crate::codes::command;
use crate::error::internal::ProtocolErrorKind;
use crate::error::{Error, Result};
use crate::packet::Packet;

pub use types::{
    FeedbackEvent, FirmwareFinish, FirmwareProgress, Notification, PcapAborted, PingSample,
    PingSummary, TracerouteHop, TracerouteSummary,
};

/// A class of server-pushed events with its own callback slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Active and gateway configuration-change notifications.
    ActiveNotify,
    /// Firmware update progress and completion.
    FirmwareUpdate,
    /// Ping replies and summary.
    Ping,
    /// Traceroute hops and completion.
    Traceroute,
    /// Packet capture abort.
    Pcap,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::ActiveNotify,
        Feature::FirmwareUpdate,
        Feature::Ping,
        Feature::Traceroute,
        Feature::Pcap,
    ];

    /// Feature started by the client command `code`.
    pub fn started_by(code: u32) -> Option<Self> {
        match code {
            command::SUBSCRIBE_NOTIFY | command::SUBSCRIBE_GW_NOTIFY => Some(Self::ActiveNotify),
            command::DEV_FWUPDATE => Some(Self::FirmwareUpdate),
            command::DEV_PING => Some(Self::Ping),
            command::DEV_TRACEROUTE => Some(Self::Traceroute),
            command::DEV_PCAP => Some(Self::Pcap),
            _ => None,
        }
    }

    /// Feature that receives the server command `code`.
    pub fn for_server_command(code: u32) -> Option<Self> {
        match code {
            command::CLIENT_ACTIVE_NOTIFY | command::CLIENT_GATEWAY_NOTIFY => {
                Some(Self::ActiveNotify)
            }
            command::CLIENT_FWUPDATE_FINISH | command::CLIENT_FWUPDATE_PROGRESS => {
                Some(Self::FirmwareUpdate)
            }
            command::CLIENT_PING | command::CLIENT_PING_COMPLETED => Some(Self::Ping),
            command::CLIENT_TRACEROUTE | command::CLIENT_TRACEROUTE_COMPLETED => {
                Some(Self::Traceroute)
            }
            command::CLIENT_PCAP_ABORTED => Some(Self::Pcap),
            _ => None,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ActiveNotify => "active notify",
            Self::FirmwareUpdate => "firmware update",
            Self::Ping => "ping",
            Self::Traceroute => "traceroute",
            Self::Pcap => "pcap",
        };
        f.write_str(name)
    }
}

/// One event delivered to a feedback callback.
///
/// When the packet could not be fully decoded, `event` holds the fields read
/// before the failure and `error` says what went wrong.
#[derive(Debug)]
pub struct Feedback {
    pub event: FeedbackEvent,
    pub error: Option<Box<Error>>,
}

impl Feedback {
    pub fn new(event: FeedbackEvent) -> Self {
        Self { event, error: None }
    }

    /// Whether the event was decoded completely.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The event, or the decode error if decoding stopped early.
    pub fn into_result(self) -> Result<FeedbackEvent> {
        match self.error {
            None => Ok(self.event),
            Some(e) => Err(e),
        }
    }
}

/// Callback owning a feature slot.
pub type FeedbackHandler = Box<dyn FnMut(Feedback) + Send>;

/// Per-connection feedback slots, one per [`Feature`].
#[derive(Default)]
pub struct FeedbackRegistry {
    slots: HashMap<Feature, FeedbackHandler>,
}

impl FeedbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the callback for `feature`, replacing any previous one.
    pub fn register<F>(&mut self, feature: Feature, handler: F)
    where
        F: FnMut(Feedback) + Send + 'static,
    {
        tracing::debug!(target: "async_dmconfig::notification", { dm.feature = %feature }, "feedback registered");
        self.slots.insert(feature, Box::new(handler));
    }

    /// Release the slot of `feature`. Returns whether it was occupied.
    pub fn clear(&mut self, feature: Feature) -> bool {
        let cleared = self.slots.remove(&feature).is_some();
        if cleared {
            tracing::debug!(target: "async_dmconfig::notification", { dm.feature = %feature }, "feedback cleared");
        }
        cleared
    }

    /// Release every slot.
    pub fn clear_all(&mut self) {
        if !self.slots.is_empty() {
            tracing::debug!(target: "async_dmconfig::notification", { dm.slots = self.slots.len() }, "all feedback cleared");
        }
        self.slots.clear();
    }

    pub fn is_registered(&self, feature: Feature) -> bool {
        self.slots.contains_key(&feature)
    }

    /// Whether any slot is occupied (which keeps the connection reading).
    pub fn any(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Deliver `feedback` to the callback of `feature`.
    ///
    /// Fails when the slot is empty. A terminal event releases the slot after
    /// the callback returns.
    pub fn dispatch(&mut self, feature: Feature, feedback: Feedback) -> Result<()> {
        let code = feedback.event.command();
        let terminal = feedback.event.is_terminal();
        let Some(handler) = self.slots.get_mut(&feature) else {
            tracing::debug!(target: "async_dmconfig::notification", { dm.feature = %feature, dm.command = command::name(code) }, "no feedback handler registered");
            return Err(Error::protocol(ProtocolErrorKind::UnregisteredFeedback { code }));
        };
        if let Some(error) = &feedback.error {
            tracing::debug!(target: "async_dmconfig::notification", { dm.feature = %feature, error = %error }, "partially decoded feedback");
        }
        handler(feedback);
        if terminal {
            self.clear(feature);
        }
        Ok(())
    }

    /// Decode a server-initiated packet and deliver it.
    ///
    /// Unknown command codes and unregistered features are protocol errors;
    /// the caller tears the connection down.
    pub fn dispatch_packet(&mut self, packet: &Packet) -> Result<()> {
        let code = packet.code();
        let Some(feature) = Feature::for_server_command(code) else {
            tracing::debug!(target: "async_dmconfig::notification", { dm.code = code }, "unknown server command");
            return Err(Error::protocol(ProtocolErrorKind::UnknownCommand { code }));
        };
        if !self.is_registered(feature) {
            tracing::debug!(target: "async_dmconfig::notification", { dm.feature = %feature, dm.command = command::name(code) }, "no feedback handler registered");
            return Err(Error::protocol(ProtocolErrorKind::UnregisteredFeedback { code }));
        }
        let (event, error) = handlers::decode_event(code, packet.avps())
            .ok_or_else(|| Error::protocol(ProtocolErrorKind::UnknownCommand { code }))?;
        tracing::trace!(target: "async_dmconfig::notification", { dm.feature = %feature, dm.command = command::name(code) }, "feedback received");
        self.dispatch(feature, Feedback { event, error })
    }
}

impl fmt::Debug for FeedbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.slots.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp::AvpWrite;
    use crate::codes::avp;
    use crate::packet::{CommandFlags, PacketBuilder};
    use std::sync::{Arc, Mutex};

    fn server_packet(code: u32, fill: impl FnOnce(&mut PacketBuilder)) -> Packet {
        let mut b = PacketBuilder::new(code, CommandFlags::REQUEST, 0, 0, 0).unwrap();
        fill(&mut b);
        Packet::decode(b.finish().unwrap()).unwrap()
    }

    fn recorder(registry: &mut FeedbackRegistry, feature: Feature) -> Arc<Mutex<Vec<Feedback>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry.register(feature, move |fb| sink.lock().unwrap().push(fb));
        seen
    }

    #[test]
    fn test_ping_slot_released_after_summary() {
        let mut reg = FeedbackRegistry::new();
        let seen = recorder(&mut reg, Feature::Ping);

        let summary = server_packet(command::CLIENT_PING_COMPLETED, |b| {
            for v in [3, 0, 10, 9, 11] {
                b.put_u32(avp::UINT32, v).unwrap();
            }
        });
        reg.dispatch_packet(&summary).unwrap();
        assert!(!reg.is_registered(Feature::Ping));

        let seen = seen.lock().unwrap();
        let FeedbackEvent::PingCompleted(s) = &seen[0].event else {
            panic!("wrong event")
        };
        assert_eq!(s.succeeded, 3);
        assert_eq!(s.max, 11);

        // A second summary finds no handler.
        drop(seen);
        assert!(reg.dispatch_packet(&summary).is_err());
    }

    #[test]
    fn test_firmware_progress_keeps_slot() {
        let mut reg = FeedbackRegistry::new();
        let seen = recorder(&mut reg, Feature::FirmwareUpdate);
        let progress = server_packet(command::CLIENT_FWUPDATE_PROGRESS, |b| {
            b.put_str(avp::STRING, "writing").unwrap();
            b.put_u32(avp::FWUPDATE_STEP, 2).unwrap();
            b.put_i32(avp::INT32, 10).unwrap();
            b.put_i32(avp::INT32, 100).unwrap();
            b.put_str(avp::STRING, "KB").unwrap();
        });
        reg.dispatch_packet(&progress).unwrap();
        assert!(reg.is_registered(Feature::FirmwareUpdate));
        assert!(seen.lock().unwrap()[0].is_ok());
    }

    #[test]
    fn test_unknown_command_and_empty_slot() {
        let mut reg = FeedbackRegistry::new();
        let unknown = server_packet(99, |_| {});
        assert!(matches!(
            *reg.dispatch_packet(&unknown).unwrap_err(),
            Error::Protocol {
                kind: ProtocolErrorKind::UnknownCommand { code: 99 }
            }
        ));

        let pcap = server_packet(command::CLIENT_PCAP_ABORTED, |b| {
            b.put_u32(avp::UINT32, 1).unwrap();
        });
        assert!(matches!(
            *reg.dispatch_packet(&pcap).unwrap_err(),
            Error::Protocol {
                kind: ProtocolErrorKind::UnregisteredFeedback { .. }
            }
        ));
    }

    #[test]
    fn test_gateway_notify_shares_active_slot() {
        let mut reg = FeedbackRegistry::new();
        let seen = recorder(&mut reg, Feature::ActiveNotify);
        let notify = server_packet(command::CLIENT_GATEWAY_NOTIFY, |b| {
            b.begin_group(avp::CONTAINER).unwrap();
            b.put_u32(avp::NOTIFY_TYPE, 1).unwrap();
            b.end_group().unwrap();
        });
        reg.dispatch_packet(&notify).unwrap();
        let seen = seen.lock().unwrap();
        let FeedbackEvent::Notification(n) = &seen[0].event else {
            panic!("wrong event")
        };
        assert!(n.gateway);
        assert!(reg.is_registered(Feature::ActiveNotify));
    }

    #[test]
    fn test_started_by() {
        assert_eq!(Feature::started_by(command::DEV_PING), Some(Feature::Ping));
        assert_eq!(
            Feature::started_by(command::SUBSCRIBE_GW_NOTIFY),
            Some(Feature::ActiveNotify)
        );
        assert_eq!(Feature::started_by(command::DB_GET), None);
    }
}
