//! Streaming packet builder with nested groups.

use bytes::Bytes;
use smallvec::SmallVec;

use super::{CommandFlags, HEADER_LEN, MAX_PACKET_LEN, PacketHeader};
use crate::avp::{AvpFlags, AvpHeader, AvpWrite, MAX_AVP_LEN, encode_avp, ensure_space, pad4};
use crate::codes;
use crate::error::internal::EncodeErrorKind;
use crate::error::{Error, Result};

/// Maximum nesting depth of [`PacketBuilder::begin_group`].
pub const MAX_GROUP_DEPTH: usize = 16;

#[derive(Debug)]
struct OpenGroup {
    start: usize,
    header: AvpHeader,
    has_mandatory: bool,
}

/// Builds one packet in place.
///
/// The header is reserved up front and back-patched by
/// [`finish`](Self::finish); container attributes opened with
/// [`begin_group`](Self::begin_group) have their lengths back-patched when
/// closed.
///
/// # Example
///
/// ```
/// use async_dmconfig::avp::AvpWrite;
/// use async_dmconfig::codes::{avp, command};
/// use async_dmconfig::packet::{CommandFlags, Packet, PacketBuilder};
///
/// # fn main() -> async_dmconfig::Result<()> {
/// let mut b = PacketBuilder::new(command::DB_SET, CommandFlags::REQUEST, 1, 10, 10)?;
/// b.begin_group(avp::CONTAINER)?;
/// b.put_str(avp::PATH, "Device.ManagementServer.URL")?;
/// b.put_str(avp::STRING, "http://acs")?;
/// b.end_group()?;
/// let bytes = b.finish()?;
///
/// let packet = Packet::decode(bytes)?;
/// let mut body = packet.avps().expect(avp::CONTAINER)?.as_group();
/// assert_eq!(body.expect(avp::PATH)?.as_str()?, "Device.ManagementServer.URL");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PacketBuilder {
    buf: Vec<u8>,
    header: PacketHeader,
    groups: SmallVec<[OpenGroup; 4]>,
}

impl PacketBuilder {
    /// Start a packet, reserving a zeroed header.
    pub fn new(code: u32, flags: CommandFlags, app_id: u32, hop_id: u32, end_id: u32) -> Result<Self> {
        if code > 0x00ff_ffff {
            return Err(Error::encode(EncodeErrorKind::CommandCodeTooLarge { code }));
        }
        let mut buf = Vec::new();
        ensure_space(&mut buf, HEADER_LEN)?;
        buf.resize(HEADER_LEN, 0);
        Ok(Self {
            buf,
            header: PacketHeader {
                version: codes::VERSION,
                length: 0,
                flags,
                code,
                app_id,
                hop_id,
                end_id,
            },
            groups: SmallVec::new(),
        })
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.groups.len()
    }

    /// Bytes written so far, header included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == HEADER_LEN
    }

    /// Open a container attribute; following attributes become its payload.
    pub fn begin_group(&mut self, header: impl Into<AvpHeader>) -> Result<()> {
        let header = header.into();
        if self.groups.len() >= MAX_GROUP_DEPTH {
            return Err(Error::encode(EncodeErrorKind::NestingTooDeep {
                max: MAX_GROUP_DEPTH,
            }));
        }
        let start = self.buf.len();
        encode_avp(&mut self.buf, header, &[])?;
        self.groups.push(OpenGroup {
            start,
            header,
            has_mandatory: false,
        });
        Ok(())
    }

    /// Close the innermost open group and back-patch its length.
    pub fn end_group(&mut self) -> Result<()> {
        let Some(group) = self.groups.last() else {
            return Err(Error::encode(EncodeErrorKind::NoOpenGroup));
        };
        let mandatory = group.header.flags.contains(AvpFlags::MANDATORY);
        if group.has_mandatory && !mandatory {
            tracing::debug!(target: "async_dmconfig::packet", { dm.code = group.header.code }, "mandatory attribute inside optional group");
            return Err(Error::encode(EncodeErrorKind::MandatoryInOptionalGroup {
                code: group.header.code,
            }));
        }
        let length = self.buf.len() - group.start;
        if length > MAX_AVP_LEN {
            return Err(Error::encode(EncodeErrorKind::TooLong { length }));
        }
        let padded = pad4(length);
        ensure_space(&mut self.buf, padded - length)?;

        let start = group.start;
        let len_bytes = (length as u32).to_be_bytes();
        self.buf[start + 5..start + 8].copy_from_slice(&len_bytes[1..]);
        self.buf.resize(start + padded, 0);
        self.groups.pop();
        self.note_written(mandatory);
        Ok(())
    }

    /// Back-patch the total length and return the encoded packet.
    pub fn finish(mut self) -> Result<Bytes> {
        if !self.groups.is_empty() {
            return Err(Error::encode(EncodeErrorKind::UnclosedGroup {
                depth: self.groups.len(),
            }));
        }
        let length = self.buf.len();
        if length > MAX_PACKET_LEN {
            return Err(Error::encode(EncodeErrorKind::TooLong { length }));
        }
        self.header.length = length as u32;
        self.header.encode_into(&mut self.buf[..HEADER_LEN]);
        Ok(Bytes::from(self.buf))
    }

    fn note_written(&mut self, mandatory: bool) {
        if let Some(parent) = self.groups.last_mut() {
            parent.has_mandatory |= mandatory;
        }
    }
}

impl AvpWrite for PacketBuilder {
    fn put_avp(&mut self, header: AvpHeader, data: &[u8]) -> Result<()> {
        encode_avp(&mut self.buf, header, data)?;
        self.note_written(header.flags.contains(AvpFlags::MANDATORY));
        Ok(())
    }
}
