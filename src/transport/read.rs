//! Packet reassembly from a non-blocking byte stream.

use std::io;

use bytes::Bytes;

use super::connection_error;
use crate::error::internal::{ConnectionErrorKind, DecodeErrorKind};
use crate::error::{Error, Result};
use crate::format::hex;
use crate::packet::{HEADER_LEN, MAX_PACKET_LEN, Packet, PacketHeader};

/// Default growth step of the receive buffer.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Outcome of polling the reassembler.
#[derive(Debug)]
pub enum ReadStatus {
    /// One full packet was detached from the front of the buffer.
    Complete(Packet),
    /// Part of a packet is buffered; more bytes are needed.
    Incomplete,
    /// Buffer is empty.
    Nothing,
}

/// Accumulates stream bytes until whole packets can be detached.
///
/// The buffer grows in whole chunks, and only when a read filled it
/// completely. Once a packet's length prefix is buffered, one growth step
/// covers the whole declared packet. Detaching a packet shifts the remaining
/// bytes to the front.
#[derive(Debug)]
pub struct Reassembler {
    buf: Vec<u8>,
    filled: usize,
    chunks: usize,
    chunk_size: usize,
    max_packet: usize,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, MAX_PACKET_LEN)
    }
}

impl Reassembler {
    /// Create a reassembler with the given growth step and packet size limit.
    pub fn new(chunk_size: usize, max_packet: usize) -> Self {
        Self {
            buf: Vec::new(),
            filled: 0,
            chunks: 0,
            chunk_size: chunk_size.max(HEADER_LEN),
            max_packet: max_packet.min(MAX_PACKET_LEN),
        }
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.filled
    }

    /// Number of chunks allocated.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Whether part of a packet is waiting for more bytes.
    pub fn has_partial(&self) -> bool {
        self.filled > 0
    }

    /// Discard all buffered state and release the buffer.
    pub fn reset(&mut self) {
        self.buf = Vec::new();
        self.filled = 0;
        self.chunks = 0;
    }

    fn grow(&mut self) -> Result<()> {
        let step = self.chunk_size;
        let mut chunks = self.chunks + 1;
        if let Some(length) = PacketHeader::peek_length(&self.buf[..self.filled]) {
            // Limits are enforced by next_packet; out-of-range lengths grow by one chunk.
            if length > self.filled && length <= self.max_packet {
                chunks = chunks.max(length.div_ceil(step));
            }
        }
        let requested = chunks * step - self.buf.len();
        self.buf.try_reserve_exact(requested).map_err(|_| {
            tracing::debug!(target: "async_dmconfig::transport", { dm.requested = requested }, "receive buffer allocation failed");
            Error::Alloc { requested }.boxed()
        })?;
        self.chunks = chunks;
        self.buf.resize(chunks * step, 0);
        Ok(())
    }

    /// Read everything currently available using `read`.
    ///
    /// `read` behaves like a non-blocking `read(2)`. Returns the number of
    /// bytes added. A zero-byte read means the peer shut down; `WouldBlock`
    /// ends the pass; `Interrupted` is retried.
    pub fn fill<F>(&mut self, mut read: F) -> Result<usize>
    where
        F: FnMut(&mut [u8]) -> io::Result<usize>,
    {
        let mut total = 0;
        loop {
            if self.filled == self.buf.len() {
                self.grow()?;
            }
            match read(&mut self.buf[self.filled..]) {
                Ok(0) => {
                    tracing::debug!(target: "async_dmconfig::transport", { dm.buffered = self.filled }, "peer closed the connection");
                    return Err(Error::connection(ConnectionErrorKind::PeerClosed));
                }
                Ok(n) => {
                    self.filled += n;
                    total += n;
                    if self.filled < self.buf.len() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(connection_error(e)),
            }
        }
        tracing::trace!(target: "async_dmconfig::transport", { dm.read = total, dm.buffered = self.filled }, "read");
        Ok(total)
    }

    /// Detach the first packet if it has fully arrived.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        let Some(length) = PacketHeader::peek_length(&self.buf[..self.filled]) else {
            return Ok(None);
        };
        if length < HEADER_LEN {
            tracing::debug!(target: "async_dmconfig::transport", { dm.length = length }, "declared packet length too short");
            return Err(Error::decode(0, DecodeErrorKind::PacketTooShort { length }));
        }
        if length > self.max_packet {
            tracing::debug!(target: "async_dmconfig::transport", { dm.length = length, dm.max = self.max_packet }, "declared packet length too large");
            return Err(Error::decode(
                0,
                DecodeErrorKind::PacketTooLarge {
                    length,
                    max: self.max_packet,
                },
            ));
        }
        if self.filled < length {
            return Ok(None);
        }

        let raw = Bytes::copy_from_slice(&self.buf[..length]);
        self.buf.copy_within(length..self.filled, 0);
        self.filled -= length;
        if self.filled == 0 {
            self.reset();
        }
        tracing::trace!(target: "async_dmconfig::transport", { dm.length = length, dm.data = %hex::Dump(&raw) }, "packet complete");
        Packet::decode(raw).map(Some)
    }

    /// Detach a packet or report how much is pending.
    pub fn poll(&mut self) -> Result<ReadStatus> {
        Ok(match self.next_packet()? {
            Some(packet) => ReadStatus::Complete(packet),
            None if self.has_partial() => ReadStatus::Incomplete,
            None => ReadStatus::Nothing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp::AvpWrite;
    use crate::codes::avp;
    use crate::packet::{CommandFlags, PacketBuilder};
    use std::collections::VecDeque;

    fn packet(hop: u32, body: &str) -> Bytes {
        let mut b = PacketBuilder::new(35, CommandFlags::empty(), 1, hop, hop).unwrap();
        b.put_u32(avp::RC, 0).unwrap();
        b.put_str(avp::STRING, body).unwrap();
        b.finish().unwrap()
    }

    /// Serves scripted chunks, then `WouldBlock`.
    struct Script(VecDeque<io::Result<Vec<u8>>>);

    impl Script {
        fn chunks(parts: Vec<Vec<u8>>) -> Self {
            Self(parts.into_iter().map(Ok).collect())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Err(io::ErrorKind::WouldBlock.into()),
                Some(Err(e)) => Err(e),
                Some(Ok(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        data.drain(..n);
                        self.0.push_front(Ok(data));
                    }
                    Ok(n)
                }
            }
        }
    }

    fn feed(r: &mut Reassembler, script: &mut Script) -> Vec<Packet> {
        let mut out = Vec::new();
        // One fill per readiness event until the script runs dry.
        while !script.0.is_empty() {
            r.fill(|buf| script.read(buf)).unwrap();
            while let ReadStatus::Complete(p) = r.poll().unwrap() {
                out.push(p);
            }
        }
        out
    }

    fn split_at(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
        let mut parts = Vec::new();
        let mut last = 0;
        for &cut in cuts {
            parts.push(data[last..cut].to_vec());
            last = cut;
        }
        parts.push(data[last..].to_vec());
        parts
    }

    #[test]
    fn test_whole_and_split_packets_decode_identically() {
        let raw = packet(7, "hello world");
        let whole = {
            let mut r = Reassembler::default();
            feed(&mut r, &mut Script::chunks(vec![raw.to_vec()]))
        };
        assert_eq!(whole.len(), 1);

        let splits: Vec<Vec<usize>> = vec![
            vec![2],                      // inside the length prefix
            vec![10],                     // inside the header
            vec![20, 21],                 // header boundary
            (1..raw.len()).collect(),     // byte by byte
            vec![3, 4, 19, 25, raw.len() - 1],
        ];
        for cuts in splits {
            let mut r = Reassembler::default();
            let got = feed(&mut r, &mut Script::chunks(split_at(&raw, &cuts)));
            assert_eq!(got.len(), 1, "cuts {:?}", cuts);
            assert_eq!(got[0].header, whole[0].header);
            assert_eq!(got[0].payload(), whole[0].payload());
            assert!(!r.has_partial());
        }
    }

    #[test]
    fn test_incomplete_until_last_byte() {
        let raw = packet(1, "x");
        let mut r = Reassembler::default();
        let mut script = Script::chunks(vec![raw[..raw.len() - 1].to_vec()]);
        r.fill(|buf| script.read(buf)).unwrap();
        assert!(matches!(r.poll().unwrap(), ReadStatus::Incomplete));

        let mut script = Script::chunks(vec![raw[raw.len() - 1..].to_vec()]);
        r.fill(|buf| script.read(buf)).unwrap();
        assert!(matches!(r.poll().unwrap(), ReadStatus::Complete(_)));
        assert!(matches!(r.poll().unwrap(), ReadStatus::Nothing));
    }

    #[test]
    fn test_back_to_back_packets_in_one_read() {
        let mut both = packet(1, "first").to_vec();
        both.extend_from_slice(&packet(2, "second"));
        let mut r = Reassembler::default();
        let mut script = Script::chunks(vec![both]);
        r.fill(|buf| script.read(buf)).unwrap();

        let ReadStatus::Complete(a) = r.poll().unwrap() else {
            panic!("first packet missing")
        };
        let ReadStatus::Complete(b) = r.poll().unwrap() else {
            panic!("second packet missing")
        };
        assert_eq!(a.hop_id(), 1);
        assert_eq!(b.hop_id(), 2);
        assert!(matches!(r.poll().unwrap(), ReadStatus::Nothing));
    }

    #[test]
    fn test_grows_in_chunks_for_large_packet() {
        let body = "z".repeat(10_000);
        let raw = packet(3, &body);
        let mut r = Reassembler::new(64, MAX_PACKET_LEN);
        let got = feed(&mut r, &mut Script::chunks(vec![raw.to_vec()]));
        assert_eq!(got.len(), 1);
        let mut avps = got[0].avps();
        avps.expect(avp::RC).unwrap();
        assert_eq!(avps.expect(avp::STRING).unwrap().as_str().unwrap(), body);
        // Buffer released once drained.
        assert_eq!(r.chunks(), 0);
    }

    #[test]
    fn test_reserves_declared_length_once_header_is_known() {
        let raw = packet(4, &"z".repeat(10_000));
        let mut r = Reassembler::new(64, MAX_PACKET_LEN);
        let mut script = Script::chunks(vec![raw.to_vec()]);
        let mut reads = 0;
        r.fill(|buf| {
            reads += 1;
            script.read(buf)
        })
        .unwrap();
        assert_eq!(r.buffered(), raw.len());
        // First chunk, then the rest of the packet, then WouldBlock.
        assert!(reads <= 3, "{} reads", reads);
        assert!(r.chunks() <= raw.len().div_ceil(64) + 1);
        assert!(matches!(r.poll().unwrap(), ReadStatus::Complete(_)));
    }

    #[test]
    fn test_oversized_declared_length_grows_one_chunk() {
        let mut r = Reassembler::new(64, 100);
        let mut header = vec![1, 0, 1, 0];
        header.resize(64, 0);
        let mut script = Script::chunks(vec![header, vec![0; 8]]);
        r.fill(|buf| script.read(buf)).unwrap();
        assert_eq!(r.chunks(), 2);
        assert!(r.poll().is_err());
    }

    #[test]
    fn test_zero_read_is_peer_closed() {
        let mut r = Reassembler::default();
        let err = r.fill(|_| Ok(0)).unwrap_err();
        assert!(matches!(
            *err,
            Error::Connection {
                kind: ConnectionErrorKind::PeerClosed,
                ..
            }
        ));
    }

    #[test]
    fn test_interrupted_is_retried_and_reset_aborts() {
        let mut r = Reassembler::default();
        let mut script = Script(VecDeque::from(vec![
            Err(io::ErrorKind::Interrupted.into()),
            Ok(vec![1, 0]),
        ]));
        assert_eq!(r.fill(|buf| script.read(buf)).unwrap(), 2);

        let mut script = Script(VecDeque::from(vec![Err(io::ErrorKind::ConnectionReset.into())]));
        let err = r.fill(|buf| script.read(buf)).unwrap_err();
        assert!(matches!(
            *err,
            Error::Connection {
                kind: ConnectionErrorKind::Reset,
                ..
            }
        ));
    }

    #[test]
    fn test_declared_length_limits() {
        let mut r = Reassembler::default();
        let mut script = Script::chunks(vec![vec![1, 0, 0, 8]]);
        r.fill(|buf| script.read(buf)).unwrap();
        assert!(r.poll().is_err());

        let mut r = Reassembler::new(DEFAULT_CHUNK_SIZE, 100);
        let mut script = Script::chunks(vec![vec![1, 0, 1, 0]]);
        r.fill(|buf| script.read(buf)).unwrap();
        assert!(matches!(
            *r.poll().unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::PacketTooLarge { length: 256, max: 100 },
                ..
            }
        ));
    }
}
