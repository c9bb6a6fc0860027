//! Append-only attribute groups and the shared typed encoders.

use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use bytes::Bytes;

use super::{AvpCursor, AvpFlags, AvpHeader, address_to_wire, date_to_wire, encode_avp};
use crate::error::internal::EncodeErrorKind;
use crate::error::{Error, Result};

/// Sink for attribute records.
///
/// Implementors provide [`put_avp`](AvpWrite::put_avp); the typed helpers are
/// layered on top and always write big-endian values.
pub trait AvpWrite {
    /// Append one attribute with the given payload.
    fn put_avp(&mut self, header: AvpHeader, data: &[u8]) -> Result<()>;

    /// Append with explicit code, flags and optional vendor id.
    fn put_raw(
        &mut self,
        code: u32,
        flags: AvpFlags,
        vendor_id: Option<u32>,
        data: &[u8],
    ) -> Result<()> {
        self.put_avp(AvpHeader::from_parts(code, flags, vendor_id), data)
    }

    fn put_u8(&mut self, header: impl Into<AvpHeader>, value: u8) -> Result<()> {
        self.put_avp(header.into(), &[value])
    }

    fn put_u16(&mut self, header: impl Into<AvpHeader>, value: u16) -> Result<()> {
        self.put_avp(header.into(), &value.to_be_bytes())
    }

    fn put_u32(&mut self, header: impl Into<AvpHeader>, value: u32) -> Result<()> {
        self.put_avp(header.into(), &value.to_be_bytes())
    }

    fn put_i32(&mut self, header: impl Into<AvpHeader>, value: i32) -> Result<()> {
        self.put_avp(header.into(), &value.to_be_bytes())
    }

    fn put_u64(&mut self, header: impl Into<AvpHeader>, value: u64) -> Result<()> {
        self.put_avp(header.into(), &value.to_be_bytes())
    }

    fn put_i64(&mut self, header: impl Into<AvpHeader>, value: i64) -> Result<()> {
        self.put_avp(header.into(), &value.to_be_bytes())
    }

    fn put_bool(&mut self, header: impl Into<AvpHeader>, value: bool) -> Result<()> {
        self.put_avp(header.into(), &[value as u8])
    }

    fn put_str(&mut self, header: impl Into<AvpHeader>, value: &str) -> Result<()> {
        self.put_avp(header.into(), value.as_bytes())
    }

    /// A `u32` followed directly by string bytes (typed path requests).
    fn put_u32_string(&mut self, header: impl Into<AvpHeader>, value: u32, text: &str) -> Result<()> {
        let mut data = Vec::with_capacity(4 + text.len());
        data.extend_from_slice(&value.to_be_bytes());
        data.extend_from_slice(text.as_bytes());
        self.put_avp(header.into(), &data)
    }

    fn put_address(&mut self, header: impl Into<AvpHeader>, addr: IpAddr) -> Result<()> {
        let (raw, len) = address_to_wire(addr);
        self.put_avp(header.into(), &raw[..len])
    }

    fn put_date(&mut self, header: impl Into<AvpHeader>, time: SystemTime) -> Result<()> {
        self.put_avp(header.into(), &date_to_wire(time).to_be_bytes())
    }

    /// Duration as seconds and microseconds (`u32` each, seconds saturate).
    fn put_timeval(&mut self, header: impl Into<AvpHeader>, value: Duration) -> Result<()> {
        let secs = u32::try_from(value.as_secs()).unwrap_or(u32::MAX);
        let mut data = [0u8; 8];
        data[..4].copy_from_slice(&secs.to_be_bytes());
        data[4..].copy_from_slice(&value.subsec_micros().to_be_bytes());
        self.put_avp(header.into(), &data)
    }

    /// Embed `inner` as the payload of a container attribute.
    ///
    /// Fails if `inner` holds a mandatory attribute and the container itself
    /// is not marked mandatory.
    fn put_group(&mut self, header: impl Into<AvpHeader>, inner: &AvpGroup) -> Result<()> {
        let header = header.into();
        if inner.has_mandatory() && !header.flags.contains(AvpFlags::MANDATORY) {
            tracing::debug!(target: "async_dmconfig::avp", { dm.code = header.code }, "mandatory attribute inside optional group");
            return Err(Error::encode(EncodeErrorKind::MandatoryInOptionalGroup {
                code: header.code,
            }));
        }
        self.put_avp(header, inner.as_bytes())
    }
}

/// Growable, append-only attribute group.
///
/// # Example
///
/// ```
/// use async_dmconfig::avp::{AvpGroup, AvpWrite};
/// use async_dmconfig::codes::avp;
///
/// # fn main() -> async_dmconfig::Result<()> {
/// let mut group = AvpGroup::new();
/// group.put_str(avp::PATH, "Device.DeviceInfo.")?;
/// group.put_u32(avp::UINT32, 42)?;
///
/// let mut cursor = group.cursor();
/// assert_eq!(cursor.expect(avp::PATH)?.as_str()?, "Device.DeviceInfo.");
/// assert_eq!(cursor.expect(avp::UINT32)?.as_u32()?, 42);
/// cursor.assert_end()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvpGroup {
    buf: Vec<u8>,
    mandatory: bool,
}

impl AvpGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one padded attribute record.
    pub fn push_raw(
        &mut self,
        code: u32,
        flags: AvpFlags,
        vendor_id: Option<u32>,
        data: &[u8],
    ) -> Result<()> {
        self.put_raw(code, flags, vendor_id, data)
    }

    /// Embed `inner` as the payload of a container attribute.
    pub fn push_group(
        &mut self,
        code: u32,
        flags: AvpFlags,
        vendor_id: Option<u32>,
        inner: &AvpGroup,
    ) -> Result<()> {
        self.put_group(AvpHeader::from_parts(code, flags, vendor_id), inner)
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whether any top-level attribute carries the mandatory flag.
    pub fn has_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Cursor over a copy of the encoded bytes.
    pub fn cursor(&self) -> AvpCursor {
        AvpCursor::new(Bytes::copy_from_slice(&self.buf))
    }

    /// Convert into immutable bytes.
    pub fn freeze(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

impl AvpWrite for AvpGroup {
    fn put_avp(&mut self, header: AvpHeader, data: &[u8]) -> Result<()> {
        encode_avp(&mut self.buf, header, data)?;
        self.mandatory |= header.flags.contains(AvpFlags::MANDATORY);
        Ok(())
    }
}
