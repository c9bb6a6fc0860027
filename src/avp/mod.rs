//! Attribute (AVP) encoding and decoding.
//!
//! Wire layout of one attribute (big-endian):
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                          code (32)                           |
//! +--------------+-----------------------------------------------+
//! |  flags (8)   |          length (24, header + payload)        |
//! +--------------+-----------------------------------------------+
//! |              vendor id (32, only if VENDOR flag)             |
//! +--------------------------------------------------------------+
//! |              payload, zero-padded to 4 bytes                 |
//! +--------------------------------------------------------------+
//! ```
//!
//! Groups are built with [`AvpGroup`] (append-only) and parsed with
//! [`AvpCursor`] (zero-copy over [`Bytes`]). Typed encoders live on the
//! [`AvpWrite`] trait so that packet builders and groups share them.

mod cursor;
mod group;

pub use cursor::AvpCursor;
pub use group::{AvpGroup, AvpWrite};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use bytes::Bytes;

use crate::codes::vendor;
use crate::error::internal::{DecodeErrorKind, EncodeErrorKind};
use crate::error::{Error, Result};

/// Attribute header size without vendor id.
pub const AVP_HEADER_LEN: usize = 8;

/// Attribute header size with vendor id.
pub const AVP_VENDOR_HEADER_LEN: usize = 12;

/// Largest value the 24-bit length field can hold.
pub const MAX_AVP_LEN: usize = 0x00ff_ffff;

/// Growth granularity of group buffers.
pub const BLOCK_SIZE: usize = 1024;

/// Seconds between the NTP era origin (1900) and the Unix epoch.
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// IANA address family numbers.
const FAMILY_IPV4: u16 = 1;
const FAMILY_IPV6: u16 = 2;

const RESERVED_FLAGS: u8 = 0x1f;

bitflags! {
    /// Attribute flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AvpFlags: u8 {
        /// A vendor id follows the length field.
        const VENDOR = 0x80;
        /// Receiver must understand this attribute.
        const MANDATORY = 0x40;
        /// Attribute may be encrypted end-to-end.
        const PRIVATE = 0x20;
    }
}

/// Round `len` up to the next multiple of four.
#[inline]
pub const fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

/// Code, flags and vendor of an attribute to be written.
///
/// A bare `u32` converts into a Travelping vendor attribute without flags,
/// which is how almost every dmconfig attribute is sent.
///
/// ```
/// use async_dmconfig::avp::{AvpFlags, AvpHeader};
///
/// let h: AvpHeader = 12u32.into();
/// assert_eq!(h.vendor_id, Some(18681));
///
/// let m = AvpHeader::new(12).mandatory();
/// assert!(m.flags.contains(AvpFlags::MANDATORY));
/// assert_eq!(m.vendor_id, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvpHeader {
    pub code: u32,
    pub flags: AvpFlags,
    pub vendor_id: Option<u32>,
}

impl AvpHeader {
    /// Attribute without vendor id or flags.
    pub const fn new(code: u32) -> Self {
        Self {
            code,
            flags: AvpFlags::empty(),
            vendor_id: None,
        }
    }

    /// Attribute tagged with the Travelping vendor id.
    pub const fn vendor(code: u32) -> Self {
        Self {
            code,
            flags: AvpFlags::empty(),
            vendor_id: Some(vendor::TRAVELPING),
        }
    }

    /// Attribute tagged with an arbitrary vendor id.
    pub const fn with_vendor(mut self, vendor_id: u32) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    /// Set the mandatory bit.
    pub const fn mandatory(mut self) -> Self {
        self.flags = self.flags.union(AvpFlags::MANDATORY);
        self
    }

    /// Set the private bit.
    pub const fn private(mut self) -> Self {
        self.flags = self.flags.union(AvpFlags::PRIVATE);
        self
    }

    /// Header size on the wire.
    pub fn header_len(&self) -> usize {
        if self.vendor_id.is_some() {
            AVP_VENDOR_HEADER_LEN
        } else {
            AVP_HEADER_LEN
        }
    }

    /// Flags as written on the wire (VENDOR tracks `vendor_id`).
    pub fn wire_flags(&self) -> AvpFlags {
        let mut flags = self.flags - AvpFlags::VENDOR;
        if self.vendor_id.is_some() {
            flags |= AvpFlags::VENDOR;
        }
        flags
    }

    /// Build from the raw `append` arguments.
    pub fn from_parts(code: u32, flags: AvpFlags, vendor_id: Option<u32>) -> Self {
        Self {
            code,
            flags,
            vendor_id,
        }
    }
}

impl From<u32> for AvpHeader {
    fn from(code: u32) -> Self {
        Self::vendor(code)
    }
}

/// Make room for `additional` bytes after the current length.
///
/// Growth is geometric and rounded up to a multiple of [`BLOCK_SIZE`]. On
/// failure the buffer is left untouched.
pub(crate) fn ensure_space(buf: &mut Vec<u8>, additional: usize) -> Result<()> {
    let needed = buf
        .len()
        .checked_add(additional)
        .ok_or_else(|| Error::Alloc {
            requested: usize::MAX,
        }.boxed())?;
    if needed <= buf.capacity() {
        return Ok(());
    }
    let target = needed.max(buf.capacity().saturating_mul(2));
    let target = target.div_ceil(BLOCK_SIZE).saturating_mul(BLOCK_SIZE);
    buf.try_reserve_exact(target - buf.len()).map_err(|_| {
        tracing::debug!(target: "async_dmconfig::avp", { dm.requested = target }, "group allocation failed");
        Error::Alloc { requested: target }.boxed()
    })
}

/// Append one padded attribute record to `buf`.
pub(crate) fn encode_avp(buf: &mut Vec<u8>, header: AvpHeader, data: &[u8]) -> Result<()> {
    let length = header.header_len() + data.len();
    if length > MAX_AVP_LEN {
        tracing::debug!(target: "async_dmconfig::avp", { dm.code = header.code, dm.length = length }, "attribute too long");
        return Err(Error::encode(EncodeErrorKind::TooLong { length }));
    }
    let padded = pad4(length);
    ensure_space(buf, padded)?;

    buf.extend_from_slice(&header.code.to_be_bytes());
    let len_bytes = (length as u32).to_be_bytes();
    buf.push(header.wire_flags().bits());
    buf.extend_from_slice(&len_bytes[1..]);
    if let Some(vendor_id) = header.vendor_id {
        buf.extend_from_slice(&vendor_id.to_be_bytes());
    }
    buf.extend_from_slice(data);
    buf.resize(buf.len() + (padded - length), 0);
    Ok(())
}

/// A decoded attribute.
///
/// `data` is a zero-copy slice of the buffer it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avp {
    pub code: u32,
    pub flags: AvpFlags,
    pub vendor_id: Option<u32>,
    pub data: Bytes,
    /// Offset of the attribute header within its group.
    pub offset: usize,
}

impl Avp {
    /// Declared length (header plus payload, without padding).
    pub fn len(&self) -> usize {
        let header = if self.vendor_id.is_some() {
            AVP_VENDOR_HEADER_LEN
        } else {
            AVP_HEADER_LEN
        };
        header + self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_mandatory(&self) -> bool {
        self.flags.contains(AvpFlags::MANDATORY)
    }

    fn invalid_length(&self, expected: usize) -> Box<Error> {
        let kind = DecodeErrorKind::InvalidLength {
            code: self.code,
            expected,
            actual: self.data.len(),
        };
        tracing::debug!(target: "async_dmconfig::avp", { dm.offset = self.offset, dm.decode_error = %kind }, "attribute width mismatch");
        Error::decode(self.offset, kind)
    }

    fn fixed<const N: usize>(&self) -> Result<[u8; N]> {
        <[u8; N]>::try_from(self.data.as_ref()).map_err(|_| self.invalid_length(N))
    }

    pub fn as_u8(&self) -> Result<u8> {
        Ok(self.fixed::<1>()?[0])
    }

    pub fn as_u16(&self) -> Result<u16> {
        self.fixed().map(u16::from_be_bytes)
    }

    pub fn as_u32(&self) -> Result<u32> {
        self.fixed().map(u32::from_be_bytes)
    }

    pub fn as_i32(&self) -> Result<i32> {
        self.fixed().map(i32::from_be_bytes)
    }

    pub fn as_u64(&self) -> Result<u64> {
        self.fixed().map(u64::from_be_bytes)
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.fixed().map(i64::from_be_bytes)
    }

    /// Boolean carried in a single byte; any non-zero value is true.
    pub fn as_bool(&self) -> Result<bool> {
        Ok(self.as_u8()? != 0)
    }

    /// Borrow the payload as UTF-8 text.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.data).map_err(|_| {
            tracing::debug!(target: "async_dmconfig::avp", { dm.offset = self.offset, dm.code = self.code }, "attribute is not valid UTF-8");
            Error::decode(self.offset, DecodeErrorKind::InvalidUtf8 { code: self.code })
        })
    }

    pub fn as_string(&self) -> Result<String> {
        self.as_str().map(str::to_owned)
    }

    /// Address as a 2-byte IANA family followed by 4 or 16 address bytes.
    pub fn as_address(&self) -> Result<IpAddr> {
        if self.data.len() < 2 {
            return Err(self.invalid_length(6));
        }
        let family = u16::from_be_bytes([self.data[0], self.data[1]]);
        let raw = &self.data[2..];
        match family {
            FAMILY_IPV4 => <[u8; 4]>::try_from(raw)
                .map(|b| IpAddr::V4(Ipv4Addr::from(b)))
                .map_err(|_| self.invalid_length(6)),
            FAMILY_IPV6 => <[u8; 16]>::try_from(raw)
                .map(|b| IpAddr::V6(Ipv6Addr::from(b)))
                .map_err(|_| self.invalid_length(18)),
            other => {
                tracing::debug!(target: "async_dmconfig::avp", { dm.offset = self.offset, dm.family = other }, "unknown address family");
                Err(Error::decode(
                    self.offset,
                    DecodeErrorKind::UnknownAddressFamily(other),
                ))
            }
        }
    }

    /// Date carried as seconds since 1900 (NTP era 0, rolling into era 1).
    pub fn as_date(&self) -> Result<SystemTime> {
        let raw = self.as_u32()? as u64;
        let unix = if raw >= NTP_UNIX_OFFSET {
            raw - NTP_UNIX_OFFSET
        } else {
            raw + (1 << 32) - NTP_UNIX_OFFSET
        };
        Ok(UNIX_EPOCH + Duration::from_secs(unix))
    }

    /// Time span carried as seconds and microseconds.
    pub fn as_timeval(&self) -> Result<Duration> {
        let raw: [u8; 8] = self.fixed()?;
        let secs = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let usecs = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
        Ok(Duration::from_secs(secs as u64) + Duration::from_micros(usecs as u64))
    }

    /// A `u32` immediately followed by a string.
    pub fn as_u32_string(&self) -> Result<(u32, &str)> {
        if self.data.len() < 4 {
            return Err(self.invalid_length(4));
        }
        let value = u32::from_be_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]);
        let text = std::str::from_utf8(&self.data[4..]).map_err(|_| {
            Error::decode(self.offset, DecodeErrorKind::InvalidUtf8 { code: self.code })
        })?;
        Ok((value, text))
    }

    /// Parse the payload as a nested group.
    pub fn as_group(&self) -> AvpCursor {
        AvpCursor::new(self.data.clone())
    }

    /// Parse the payload as a nested group that must not be empty.
    pub fn as_nonempty_group(&self) -> Result<AvpCursor> {
        if self.data.is_empty() {
            let kind = DecodeErrorKind::EmptyContainer { code: self.code };
            tracing::debug!(target: "async_dmconfig::avp", { dm.offset = self.offset, dm.decode_error = %kind }, "empty container");
            return Err(Error::decode(self.offset, kind));
        }
        Ok(self.as_group())
    }
}

pub(crate) fn date_to_wire(time: SystemTime) -> u32 {
    let unix = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    (unix.wrapping_add(NTP_UNIX_OFFSET) & 0xffff_ffff) as u32
}

pub(crate) fn address_to_wire(addr: IpAddr) -> ([u8; 18], usize) {
    let mut out = [0u8; 18];
    match addr {
        IpAddr::V4(v4) => {
            out[..2].copy_from_slice(&FAMILY_IPV4.to_be_bytes());
            out[2..6].copy_from_slice(&v4.octets());
            (out, 6)
        }
        IpAddr::V6(v6) => {
            out[..2].copy_from_slice(&FAMILY_IPV6.to_be_bytes());
            out[2..18].copy_from_slice(&v6.octets());
            (out, 18)
        }
    }
}

pub(crate) fn reserved_flags(flags: u8) -> bool {
    flags & RESERVED_FLAGS != 0
}
