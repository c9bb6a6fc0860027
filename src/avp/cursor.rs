//! Zero-copy attribute cursor.

use bytes::Bytes;

use super::{AVP_HEADER_LEN, AVP_VENDOR_HEADER_LEN, Avp, AvpFlags, pad4, reserved_flags};
use crate::error::internal::DecodeErrorKind;
use crate::error::{Error, Result};

/// Read-only cursor over an encoded attribute group.
///
/// Advancing always moves by the padded length of the record, regardless of
/// its declared length.
#[derive(Debug, Clone, Default)]
pub struct AvpCursor {
    data: Bytes,
    offset: usize,
}

impl AvpCursor {
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Create a cursor from a byte slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// The whole underlying buffer.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    fn malformed(&self, kind: DecodeErrorKind) -> Box<Error> {
        tracing::debug!(target: "async_dmconfig::avp", { dm.offset = self.offset, dm.decode_error = %kind }, "malformed attribute");
        Error::decode(self.offset, kind)
    }

    /// Take the next attribute.
    ///
    /// Returns `Ok(None)` at the end of the group. A record whose declared
    /// length is below the header size, or whose padded length runs past the
    /// buffer, is rejected without touching bytes beyond the buffer.
    pub fn next_avp(&mut self) -> Result<Option<Avp>> {
        if self.is_empty() {
            return Ok(None);
        }
        let avail = self.remaining();
        if avail < AVP_HEADER_LEN {
            return Err(self.malformed(DecodeErrorKind::Truncated {
                needed: AVP_HEADER_LEN,
                available: avail,
            }));
        }

        let b = &self.data[self.offset..];
        let code = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let raw_flags = b[4];
        let length = u32::from_be_bytes([0, b[5], b[6], b[7]]) as usize;

        if reserved_flags(raw_flags) {
            return Err(self.malformed(DecodeErrorKind::ReservedAvpFlags { flags: raw_flags }));
        }
        let flags = AvpFlags::from_bits_truncate(raw_flags);
        let header_len = if flags.contains(AvpFlags::VENDOR) {
            AVP_VENDOR_HEADER_LEN
        } else {
            AVP_HEADER_LEN
        };
        if length < header_len {
            return Err(self.malformed(DecodeErrorKind::AvpTooShort { length }));
        }
        let padded = pad4(length);
        if padded > avail {
            return Err(self.malformed(DecodeErrorKind::Truncated {
                needed: padded,
                available: avail,
            }));
        }

        let vendor_id = flags
            .contains(AvpFlags::VENDOR)
            .then(|| u32::from_be_bytes([b[8], b[9], b[10], b[11]]));

        let start = self.offset;
        let data = self.data.slice(start + header_len..start + length);
        self.offset = start + padded;

        tracing::trace!(target: "async_dmconfig::avp", { dm.offset = start, dm.code = code, dm.length = length }, "attribute");
        Ok(Some(Avp {
            code,
            flags,
            vendor_id,
            data,
            offset: start,
        }))
    }

    /// Take the next attribute, which must exist.
    pub fn take_avp(&mut self) -> Result<Avp> {
        match self.next_avp()? {
            Some(avp) => Ok(avp),
            None => Err(self.malformed(DecodeErrorKind::EndOfGroup)),
        }
    }

    /// Take the next attribute and require its code.
    pub fn expect(&mut self, code: u32) -> Result<Avp> {
        let avp = self.take_avp()?;
        if avp.code != code {
            let kind = DecodeErrorKind::UnexpectedCode {
                expected: code,
                actual: avp.code,
            };
            tracing::debug!(target: "async_dmconfig::avp", { dm.offset = avp.offset, dm.decode_error = %kind }, "unexpected attribute");
            return Err(Error::decode(avp.offset, kind));
        }
        Ok(avp)
    }

    /// Fail unless the cursor is exactly at the end of the group.
    pub fn assert_end(&self) -> Result<()> {
        if self.offset == self.data.len() {
            Ok(())
        } else {
            Err(self.malformed(DecodeErrorKind::TrailingData {
                remaining: self.remaining(),
            }))
        }
    }
}

impl Iterator for AvpCursor {
    type Item = Result<Avp>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_avp() {
            Ok(Some(avp)) => Some(Ok(avp)),
            Ok(None) => None,
            Err(e) => {
                // Stop after the first error.
                self.offset = self.data.len();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_length_below_minimum() {
        // code 1, flags 0, length 4, followed by enough bytes to tempt a reader.
        let mut c = AvpCursor::from_slice(&[0, 0, 0, 1, 0, 0, 0, 4, 0xff, 0xff, 0xff, 0xff]);
        let err = c.next_avp().unwrap_err();
        assert!(matches!(
            *err,
            Error::Decode {
                offset: 0,
                kind: DecodeErrorKind::AvpTooShort { length: 4 }
            }
        ));
    }

    #[test]
    fn test_vendor_flag_requires_twelve_bytes() {
        let mut c = AvpCursor::from_slice(&[0, 0, 0, 1, 0x80, 0, 0, 8, 0, 0, 0, 0]);
        assert!(matches!(
            *c.next_avp().unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::AvpTooShort { length: 8 },
                ..
            }
        ));
    }

    #[test]
    fn test_length_past_end() {
        let mut c = AvpCursor::from_slice(&[0, 0, 0, 1, 0, 0, 0, 64, 1, 2, 3, 4]);
        assert!(matches!(
            *c.next_avp().unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::Truncated { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_short_header() {
        let mut c = AvpCursor::from_slice(&[0, 0, 0]);
        assert!(c.next_avp().is_err());
    }

    #[test]
    fn test_reserved_flags_rejected() {
        let mut c = AvpCursor::from_slice(&[0, 0, 0, 1, 0x01, 0, 0, 8]);
        assert!(matches!(
            *c.next_avp().unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::ReservedAvpFlags { flags: 0x01 },
                ..
            }
        ));
    }

    #[test]
    fn test_advances_by_padded_length() {
        let mut c = AvpCursor::from_slice(&[
            0, 0, 0, 1, 0, 0, 0, 9, 0xaa, 0, 0, 0, // 1-byte payload + 3 pad
            0, 0, 0, 2, 0, 0, 0, 8, // empty payload
        ]);
        let first = c.next_avp().unwrap().unwrap();
        assert_eq!(first.data.as_ref(), &[0xaa]);
        assert_eq!(c.offset(), 12);
        let second = c.next_avp().unwrap().unwrap();
        assert_eq!(second.code, 2);
        assert!(c.next_avp().unwrap().is_none());
        c.assert_end().unwrap();
    }

    #[test]
    fn test_expect_end_and_mismatch() {
        let mut c = AvpCursor::from_slice(&[0, 0, 0, 2, 0, 0, 0, 8]);
        assert!(matches!(
            *c.clone().expect(3).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::UnexpectedCode {
                    expected: 3,
                    actual: 2
                },
                ..
            }
        ));
        c.expect(2).unwrap();
        assert!(matches!(
            *c.expect(2).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::EndOfGroup,
                ..
            }
        ));
    }

    #[test]
    fn test_assert_end_with_trailing() {
        let c = AvpCursor::from_slice(&[0, 0, 0, 2, 0, 0, 0, 8]);
        assert!(c.assert_end().is_err());
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let c = AvpCursor::from_slice(&[0, 0, 0, 2, 0, 0, 0, 8, 0, 0, 0, 1, 0, 0, 0, 4]);
        let items: Vec<_> = c.collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
