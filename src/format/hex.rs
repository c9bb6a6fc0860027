//! Hexadecimal rendering of binary values and packet dumps.

use std::fmt;

/// Longest prefix shown by [`Dump`] before eliding the rest.
pub const DUMP_LIMIT: usize = 64;

/// Encode bytes as a lowercase hex string.
///
/// ```
/// use async_dmconfig::format::hex::encode;
///
/// assert_eq!(encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
/// ```
pub fn encode(bytes: &[u8]) -> String {
    Bytes(bytes).to_string()
}

/// Parse a hex string (either case, even length) into bytes.
///
/// Returns `None` on odd length or a non-hex digit. Used by the command-line
/// tool to accept binary values.
///
/// ```
/// use async_dmconfig::format::hex::decode;
///
/// assert_eq!(decode("00FFa0"), Some(vec![0x00, 0xff, 0xa0]));
/// assert_eq!(decode("abc"), None);
/// ```
pub fn decode(s: &str) -> Option<Vec<u8>> {
    let digits = s.as_bytes();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks_exact(2)
        .map(|pair| Some((nibble(pair[0])? << 4) | nibble(pair[1])?))
        .collect()
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Lazy hex formatter; formats only when displayed.
pub struct Bytes<'a>(pub &'a [u8]);

impl fmt::Display for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))
    }
}

impl fmt::Debug for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Lazy, length-limited hex formatter for wire traces.
///
/// Shows at most [`DUMP_LIMIT`] bytes followed by the elided count.
pub struct Dump<'a>(pub &'a [u8]);

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() <= DUMP_LIMIT {
            return fmt::Display::fmt(&Bytes(self.0), f);
        }
        write!(
            f,
            "{}..(+{} bytes)",
            Bytes(&self.0[..DUMP_LIMIT]),
            self.0.len() - DUMP_LIMIT
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_display() {
        assert_eq!(format!("{}", Bytes(&[0x00, 0xff, 0x42])), "00ff42");
        assert_eq!(format!("{:?}", Bytes(&[])), "");
    }

    #[test]
    fn test_decode_rejects_bad_digits() {
        assert_eq!(decode(""), Some(vec![]));
        assert_eq!(decode("0g"), None);
        assert_eq!(decode("  "), None);
    }

    #[test]
    fn test_dump_elides_long_input() {
        let data = vec![0xaa; DUMP_LIMIT + 3];
        let out = Dump(&data).to_string();
        assert!(out.ends_with("..(+3 bytes)"));
        assert_eq!(out.len(), DUMP_LIMIT * 2 + "..(+3 bytes)".len());

        assert_eq!(Dump(&[1, 2]).to_string(), "0102");
    }
}
