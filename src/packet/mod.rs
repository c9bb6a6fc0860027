//! Packet framing.
//!
//! Every packet starts with a fixed 20-byte header followed by an attribute
//! group:
//!
//! ```text
//! +---------------+-----------------------------------------------+
//! |   version     |              total length (24)                |
//! +---------------+-----------------------------------------------+
//! |    flags      |              command code (24)                |
//! +---------------+-----------------------------------------------+
//! |                      application id                           |
//! +---------------------------------------------------------------+
//! |                      hop-by-hop id                            |
//! +---------------------------------------------------------------+
//! |                      end-to-end id                            |
//! +---------------------------------------------------------------+
//! ```
//!
//! The total length sits in the first four bytes, so a stream reader can size
//! the packet as soon as those have arrived.

mod builder;

pub use builder::{MAX_GROUP_DEPTH, PacketBuilder};

use bitflags::bitflags;
use bytes::Bytes;

use crate::avp::AvpCursor;
use crate::codes::{self, command};
use crate::error::internal::DecodeErrorKind;
use crate::error::{Error, Result};

/// Size of the fixed packet header.
pub const HEADER_LEN: usize = 20;

/// Largest packet the 24-bit length field can describe.
pub const MAX_PACKET_LEN: usize = 0x00ff_ffff;

/// Bytes needed before the total length can be read.
pub const LENGTH_PREFIX_LEN: usize = 4;

const RESERVED_COMMAND_FLAGS: u8 = 0x0f;

bitflags! {
    /// Command flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandFlags: u8 {
        /// Packet is a request (server-initiated when received by a client).
        const REQUEST = 0x80;
        const PROXIABLE = 0x40;
        const ERROR = 0x20;
        const RETRANSMITTED = 0x10;
    }
}

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub version: u8,
    /// Total length including the header.
    pub length: u32,
    pub flags: CommandFlags,
    /// 24-bit command code.
    pub code: u32,
    pub app_id: u32,
    pub hop_id: u32,
    pub end_id: u32,
}

impl PacketHeader {
    /// Read the declared total length from the first four bytes.
    ///
    /// Returns `None` while fewer than four bytes are available.
    ///
    /// ```
    /// use async_dmconfig::packet::PacketHeader;
    ///
    /// assert_eq!(PacketHeader::peek_length(&[1, 0, 0]), None);
    /// assert_eq!(PacketHeader::peek_length(&[1, 0, 0x01, 0x04, 0x80]), Some(260));
    /// ```
    pub fn peek_length(data: &[u8]) -> Option<usize> {
        if data.len() < LENGTH_PREFIX_LEN {
            return None;
        }
        Some(u32::from_be_bytes([0, data[1], data[2], data[3]]) as usize)
    }

    /// Decode the header from the start of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            let kind = DecodeErrorKind::Truncated {
                needed: HEADER_LEN,
                available: data.len(),
            };
            tracing::debug!(target: "async_dmconfig::packet", { dm.decode_error = %kind }, "short packet header");
            return Err(Error::decode(0, kind));
        }
        let word = |at: usize| u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);

        let version = data[0];
        if version != codes::VERSION {
            tracing::debug!(target: "async_dmconfig::packet", { dm.version = version }, "unsupported packet version");
            return Err(Error::decode(0, DecodeErrorKind::UnknownVersion(version)));
        }
        let raw_flags = data[4];
        if raw_flags & RESERVED_COMMAND_FLAGS != 0 {
            tracing::debug!(target: "async_dmconfig::packet", { dm.flags = raw_flags }, "reserved command flags set");
            return Err(Error::decode(
                4,
                DecodeErrorKind::ReservedCommandFlags { flags: raw_flags },
            ));
        }

        Ok(Self {
            version,
            length: word(0) & 0x00ff_ffff,
            flags: CommandFlags::from_bits_truncate(raw_flags),
            code: word(4) & 0x00ff_ffff,
            app_id: word(8),
            hop_id: word(12),
            end_id: word(16),
        })
    }

    /// Write the header into the first [`HEADER_LEN`] bytes of `out`.
    pub(crate) fn encode_into(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.length.to_be_bytes());
        out[0] = self.version;
        out[4..8].copy_from_slice(&self.code.to_be_bytes());
        out[4] = self.flags.bits();
        out[8..12].copy_from_slice(&self.app_id.to_be_bytes());
        out[12..16].copy_from_slice(&self.hop_id.to_be_bytes());
        out[16..20].copy_from_slice(&self.end_id.to_be_bytes());
    }

    pub fn is_request(&self) -> bool {
        self.flags.contains(CommandFlags::REQUEST)
    }
}

/// A complete received packet.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: PacketHeader,
    payload: Bytes,
}

impl Packet {
    /// Decode a packet whose bytes were framed by the declared length.
    pub fn decode(data: Bytes) -> Result<Self> {
        let header = PacketHeader::decode(&data)?;
        let declared = header.length as usize;
        if declared < HEADER_LEN {
            return Err(Error::decode(
                0,
                DecodeErrorKind::PacketTooShort { length: declared },
            ));
        }
        if declared != data.len() {
            tracing::debug!(target: "async_dmconfig::packet", { dm.declared = declared, dm.actual = data.len() }, "packet length mismatch");
            return Err(Error::decode(
                0,
                DecodeErrorKind::PacketLengthMismatch {
                    declared,
                    actual: data.len(),
                },
            ));
        }
        Ok(Self {
            header,
            payload: data.slice(HEADER_LEN..),
        })
    }

    /// Attribute group following the header.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Cursor over the top-level attributes.
    pub fn avps(&self) -> AvpCursor {
        AvpCursor::new(self.payload.clone())
    }

    pub fn is_request(&self) -> bool {
        self.header.is_request()
    }

    pub fn code(&self) -> u32 {
        self.header.code
    }

    pub fn hop_id(&self) -> u32 {
        self.header.hop_id
    }

    /// Command name for logs.
    pub fn command_name(&self) -> &'static str {
        command::name(self.header.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp::AvpWrite;
    use crate::codes::avp;

    #[test]
    fn test_header_layout() {
        let mut b = PacketBuilder::new(0x01_02_03, CommandFlags::REQUEST, 7, 0xaabbccdd, 0x11223344)
            .unwrap();
        b.put_u32(avp::SESSIONID, 9).unwrap();
        let bytes = b.finish().unwrap();

        assert_eq!(bytes.len(), HEADER_LEN + 16);
        assert_eq!(&bytes[..4], &[1, 0, 0, 36]);
        assert_eq!(&bytes[4..8], &[0x80, 0x01, 0x02, 0x03]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 7]);
        assert_eq!(&bytes[12..16], &[0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(&bytes[16..20], &[0x11, 0x22, 0x33, 0x44]);

        let packet = Packet::decode(bytes).unwrap();
        assert!(packet.is_request());
        assert_eq!(packet.code(), 0x01_02_03);
        assert_eq!(packet.header.app_id, 7);
        assert_eq!(packet.hop_id(), 0xaabbccdd);
        assert_eq!(packet.header.end_id, 0x11223344);
        let mut avps = packet.avps();
        assert_eq!(avps.expect(avp::SESSIONID).unwrap().as_u32().unwrap(), 9);
        avps.assert_end().unwrap();
    }

    #[test]
    fn test_reject_reserved_flags() {
        let mut raw = [0u8; HEADER_LEN];
        raw[0] = 1;
        raw[3] = HEADER_LEN as u8;
        raw[4] = 0x01;
        assert!(matches!(
            *PacketHeader::decode(&raw).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::ReservedCommandFlags { flags: 0x01 },
                ..
            }
        ));
    }

    #[test]
    fn test_reject_bad_version_and_length() {
        let mut raw = [0u8; HEADER_LEN];
        raw[0] = 2;
        raw[3] = HEADER_LEN as u8;
        assert!(PacketHeader::decode(&raw).is_err());

        raw[0] = 1;
        raw[3] = 8;
        assert!(Packet::decode(Bytes::copy_from_slice(&raw)).is_err());

        raw[3] = 24;
        assert!(matches!(
            *Packet::decode(Bytes::copy_from_slice(&raw)).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::PacketLengthMismatch { declared: 24, actual: 20 },
                ..
            }
        ));
    }
}
