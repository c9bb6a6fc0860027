//! Draining packets to a non-blocking byte stream.

use std::io;

use bytes::Bytes;

use super::connection_error;
use super::sigpipe::SigpipeGuard;
use crate::error::internal::ConnectionErrorKind;
use crate::error::{Error, Result};

/// Outcome of one write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Socket accepted nothing (or no packet is queued).
    Nothing,
    /// Some bytes remain; wait for the next writable event.
    Incomplete,
    /// The current packet was written out entirely.
    Complete,
}

/// Tracks the packet currently being written and how far it got.
#[derive(Debug, Default)]
pub struct WriteScheduler {
    current: Option<Bytes>,
    offset: usize,
    hop_id: u32,
}

impl WriteScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin writing `packet`, which belongs to request `hop_id`.
    pub fn start(&mut self, hop_id: u32, packet: Bytes) {
        self.current = Some(packet);
        self.offset = 0;
        self.hop_id = hop_id;
    }

    /// Whether a packet is queued or partly written.
    pub fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    /// Whether a packet has been partly written.
    pub fn is_partial(&self) -> bool {
        self.current.is_some() && self.offset > 0
    }

    /// Hop id of the packet being written.
    pub fn hop_id(&self) -> Option<u32> {
        self.current.as_ref().map(|_| self.hop_id)
    }

    /// Bytes still to be written.
    pub fn remaining(&self) -> usize {
        self.current
            .as_ref()
            .map_or(0, |data| data.len() - self.offset)
    }

    /// Drop the current packet.
    pub fn reset(&mut self) {
        self.current = None;
        self.offset = 0;
        self.hop_id = 0;
    }

    /// Issue one write of the remaining bytes through `write`.
    ///
    /// `write` behaves like a non-blocking `write(2)`. SIGPIPE is ignored for
    /// the duration of the call. A zero-byte write, a broken pipe and a reset
    /// are connection errors.
    pub fn write<F>(&mut self, mut write: F) -> Result<WriteStatus>
    where
        F: FnMut(&[u8]) -> io::Result<usize>,
    {
        let Some(data) = self.current.as_ref() else {
            return Ok(WriteStatus::Nothing);
        };
        loop {
            let result = {
                let _guard = SigpipeGuard::ignore();
                write(&data[self.offset..])
            };
            match result {
                Ok(0) => {
                    tracing::debug!(target: "async_dmconfig::transport", { dm.hop_id = self.hop_id }, "zero-length write");
                    return Err(Error::connection(ConnectionErrorKind::PeerClosed));
                }
                Ok(n) => {
                    self.offset += n;
                    tracing::trace!(target: "async_dmconfig::transport", { dm.hop_id = self.hop_id, dm.written = n, dm.remaining = data.len() - self.offset }, "write");
                    if self.offset < data.len() {
                        return Ok(WriteStatus::Incomplete);
                    }
                    self.reset();
                    return Ok(WriteStatus::Complete);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(WriteStatus::Nothing),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(connection_error(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_writes_then_complete() {
        let mut w = WriteScheduler::new();
        w.start(9, Bytes::from_static(b"0123456789"));
        assert_eq!(w.hop_id(), Some(9));

        let mut sink = Vec::new();
        let mut step = |buf: &[u8]| -> io::Result<usize> {
            let n = buf.len().min(4);
            sink.extend_from_slice(&buf[..n]);
            Ok(n)
        };
        assert_eq!(w.write(&mut step).unwrap(), WriteStatus::Incomplete);
        assert!(w.is_partial());
        assert_eq!(w.remaining(), 6);
        assert_eq!(w.write(&mut step).unwrap(), WriteStatus::Incomplete);
        assert_eq!(w.write(&mut step).unwrap(), WriteStatus::Complete);
        assert!(!w.is_busy());
        assert_eq!(sink, b"0123456789");
    }

    #[test]
    fn test_would_block_is_nothing() {
        let mut w = WriteScheduler::new();
        w.start(1, Bytes::from_static(b"abc"));
        let status = w
            .write(|_| Err(io::ErrorKind::WouldBlock.into()))
            .unwrap();
        assert_eq!(status, WriteStatus::Nothing);
        assert_eq!(w.remaining(), 3);
    }

    #[test]
    fn test_interrupted_is_retried() {
        let mut w = WriteScheduler::new();
        w.start(1, Bytes::from_static(b"abc"));
        let mut calls = 0;
        let status = w
            .write(|buf| {
                calls += 1;
                if calls == 1 {
                    Err(io::ErrorKind::Interrupted.into())
                } else {
                    Ok(buf.len())
                }
            })
            .unwrap();
        assert_eq!(status, WriteStatus::Complete);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_broken_pipe_and_reset_abort() {
        for (kind, expected) in [
            (io::ErrorKind::BrokenPipe, ConnectionErrorKind::BrokenPipe),
            (io::ErrorKind::ConnectionReset, ConnectionErrorKind::Reset),
        ] {
            let mut w = WriteScheduler::new();
            w.start(1, Bytes::from_static(b"abc"));
            let err = w.write(|_| Err(kind.into())).unwrap_err();
            assert!(matches!(*err, Error::Connection { kind, .. } if kind == expected));
        }
    }

    #[test]
    fn test_idle_write_is_nothing() {
        let mut w = WriteScheduler::new();
        assert_eq!(w.write(|_| Ok(1)).unwrap(), WriteStatus::Nothing);
    }
}
