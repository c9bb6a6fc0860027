//! Positional decoding of server-initiated packets.
//!
//! Each event is a fixed sequence of attributes. Decoding stops at the first
//! missing or malformed field; the fields read so far are still delivered,
//! together with the error.

use crate::avp::AvpCursor;
use crate::codes::{avp, command};
use crate::error::{Error, Result};

use super::types::{
    FeedbackEvent, FirmwareFinish, FirmwareProgress, Notification, PcapAborted, PingSample,
    PingSummary, TracerouteHop, TracerouteSummary,
};

/// Event types decoded field by field.
trait Positional: Default {
    fn read(&mut self, body: &mut AvpCursor) -> Result<()>;
}

fn decode<T: Positional>(mut body: AvpCursor) -> (T, Option<Box<Error>>) {
    let mut event = T::default();
    let error = event.read(&mut body).err();
    (event, error)
}

impl Positional for FirmwareFinish {
    fn read(&mut self, body: &mut AvpCursor) -> Result<()> {
        self.code = body.expect(avp::INT32)?.as_i32()?;
        self.message = body.expect(avp::STRING)?.as_string()?;
        Ok(())
    }
}

impl Positional for FirmwareProgress {
    fn read(&mut self, body: &mut AvpCursor) -> Result<()> {
        self.message = body.expect(avp::STRING)?.as_string()?;
        self.state = body.expect(avp::FWUPDATE_STEP)?.as_u32()?;
        self.current = body.expect(avp::INT32)?.as_i32()?;
        self.total = body.expect(avp::INT32)?.as_i32()?;
        self.unit = body.expect(avp::STRING)?.as_string()?;
        Ok(())
    }
}

impl Positional for PingSample {
    fn read(&mut self, body: &mut AvpCursor) -> Result<()> {
        self.bytes = body.expect(avp::UINT32)?.as_u32()?;
        self.address = Some(body.expect(avp::ADDRESS)?.as_address()?);
        self.sequence = body.expect(avp::UINT16)?.as_u16()?;
        self.rtt = body.expect(avp::UINT32)?.as_u32()?;
        Ok(())
    }
}

impl Positional for PingSummary {
    fn read(&mut self, body: &mut AvpCursor) -> Result<()> {
        for field in [
            &mut self.succeeded,
            &mut self.failed,
            &mut self.avg,
            &mut self.min,
            &mut self.max,
        ] {
            *field = body.expect(avp::UINT32)?.as_u32()?;
        }
        Ok(())
    }
}

impl Positional for TracerouteHop {
    fn read(&mut self, body: &mut AvpCursor) -> Result<()> {
        self.code = body.expect(avp::INT32)?.as_i32()?;
        self.hop = body.expect(avp::UINT8)?.as_u8()?;
        let hostname = body.expect(avp::STRING)?.as_string()?;
        self.hostname = (!hostname.is_empty()).then_some(hostname);
        self.address = Some(body.expect(avp::ADDRESS)?.as_address()?);
        self.time = body.expect(avp::INT32)?.as_i32()?;
        Ok(())
    }
}

impl Positional for TracerouteSummary {
    fn read(&mut self, body: &mut AvpCursor) -> Result<()> {
        self.code = body.expect(avp::INT32)?.as_i32()?;
        Ok(())
    }
}

impl Positional for PcapAborted {
    fn read(&mut self, body: &mut AvpCursor) -> Result<()> {
        self.code = body.expect(avp::UINT32)?.as_u32()?;
        Ok(())
    }
}

fn decode_notification(mut body: AvpCursor, gateway: bool) -> (Notification, Option<Box<Error>>) {
    let group = body
        .expect(avp::CONTAINER)
        .and_then(|container| container.as_nonempty_group());
    match group {
        Ok(group) => (Notification { gateway, group }, None),
        Err(e) => (
            Notification {
                gateway,
                ..Default::default()
            },
            Some(e),
        ),
    }
}

/// Decode the body of a server-initiated packet.
///
/// Returns `None` for command codes that carry no known event.
pub(crate) fn decode_event(
    code: u32,
    body: AvpCursor,
) -> Option<(FeedbackEvent, Option<Box<Error>>)> {
    fn wrap<T>(
        (event, error): (T, Option<Box<Error>>),
        variant: fn(T) -> FeedbackEvent,
    ) -> (FeedbackEvent, Option<Box<Error>>) {
        (variant(event), error)
    }

    Some(match code {
        command::CLIENT_ACTIVE_NOTIFY => wrap(decode_notification(body, false), FeedbackEvent::Notification),
        command::CLIENT_GATEWAY_NOTIFY => wrap(decode_notification(body, true), FeedbackEvent::Notification),
        command::CLIENT_FWUPDATE_FINISH => wrap(decode(body), FeedbackEvent::FirmwareFinish),
        command::CLIENT_FWUPDATE_PROGRESS => wrap(decode(body), FeedbackEvent::FirmwareProgress),
        command::CLIENT_PING => wrap(decode(body), FeedbackEvent::PingSample),
        command::CLIENT_PING_COMPLETED => wrap(decode(body), FeedbackEvent::PingCompleted),
        command::CLIENT_TRACEROUTE => wrap(decode(body), FeedbackEvent::TracerouteHop),
        command::CLIENT_TRACEROUTE_COMPLETED => wrap(decode(body), FeedbackEvent::TracerouteCompleted),
        command::CLIENT_PCAP_ABORTED => wrap(decode(body), FeedbackEvent::PcapAborted),
        _ => return None,
    })
}
