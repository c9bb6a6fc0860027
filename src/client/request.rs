//! Outstanding requests and their correlation with answers.

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;

use crate::avp::AvpCursor;
use crate::codes::command;
use crate::error::internal::ProtocolErrorKind;
use crate::error::{Error, Result};

/// Successful answer to a request.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Command code the answer belongs to.
    pub command: u32,
    /// Body of the answer's container attribute, if it carried one.
    pub group: Option<AvpCursor>,
}

impl Answer {
    /// The answer body, or an empty cursor when the answer had none.
    pub fn body(&self) -> AvpCursor {
        self.group.clone().unwrap_or_default()
    }

    /// The answer body, failing when the answer had none.
    pub fn require_body(&self) -> Result<AvpCursor> {
        self.group.clone().ok_or_else(|| {
            tracing::debug!(target: "async_dmconfig::client", { dm.command = command::name(self.command) }, "answer has no body");
            Error::protocol(ProtocolErrorKind::MissingField {
                code: crate::codes::avp::CONTAINER,
            })
        })
    }
}

/// Completion handler invoked exactly once per request.
pub type AnswerHandler = Box<dyn FnOnce(Result<Answer>) + Send>;

/// Lifecycle of a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Queued, nothing written yet.
    AwaitingWrite,
    /// Handed to the write scheduler.
    Writing,
    /// Fully written; waiting for the answer.
    AwaitingRead,
}

/// A request owned by the connection until its answer arrives.
pub struct PendingRequest {
    pub hop_id: u32,
    pub code: u32,
    pub status: RequestStatus,
    packet: Option<Bytes>,
    handler: AnswerHandler,
}

impl PendingRequest {
    pub fn new(hop_id: u32, code: u32, packet: Bytes, handler: AnswerHandler) -> Self {
        Self {
            hop_id,
            code,
            status: RequestStatus::AwaitingWrite,
            packet: Some(packet),
            handler,
        }
    }

    /// Run the completion handler.
    pub fn complete(self, result: Result<Answer>) {
        (self.handler)(result);
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("hop_id", &self.hop_id)
            .field("code", &command::name(self.code))
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// FIFO of outstanding requests.
///
/// Requests are written in registration order and matched to answers by hop
/// id, so answers may complete them in any order.
#[derive(Debug, Default)]
pub struct RequestQueue {
    requests: VecDeque<PendingRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: PendingRequest) {
        tracing::trace!(target: "async_dmconfig::client", { dm.hop_id = request.hop_id, dm.command = command::name(request.code) }, "request queued");
        self.requests.push_back(request);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Whether any request still has to be written.
    pub fn has_unwritten(&self) -> bool {
        self.requests
            .iter()
            .any(|r| r.status == RequestStatus::AwaitingWrite)
    }

    /// Whether any request is waiting for its answer.
    pub fn has_awaiting_read(&self) -> bool {
        self.requests
            .iter()
            .any(|r| r.status == RequestStatus::AwaitingRead)
    }

    pub fn status(&self, hop_id: u32) -> Option<RequestStatus> {
        self.requests
            .iter()
            .find(|r| r.hop_id == hop_id)
            .map(|r| r.status)
    }

    /// Take the packet of the oldest unwritten request and mark it writing.
    pub fn next_to_write(&mut self) -> Option<(u32, Bytes)> {
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.status == RequestStatus::AwaitingWrite)?;
        let packet = request.packet.take()?;
        request.status = RequestStatus::Writing;
        Some((request.hop_id, packet))
    }

    /// Record that the request's packet has been written out.
    pub fn mark_awaiting_read(&mut self, hop_id: u32) {
        if let Some(request) = self.requests.iter_mut().find(|r| r.hop_id == hop_id) {
            request.status = RequestStatus::AwaitingRead;
        }
    }

    /// Remove the request an answer with `hop_id` belongs to.
    ///
    /// Fails if no request has that hop id or the request was not fully
    /// written yet.
    pub fn take_answered(&mut self, hop_id: u32) -> Result<PendingRequest> {
        let Some(index) = self.requests.iter().position(|r| r.hop_id == hop_id) else {
            tracing::debug!(target: "async_dmconfig::client", { dm.hop_id = hop_id }, "answer for unknown hop id");
            return Err(Error::protocol(ProtocolErrorKind::UnknownHopId { hop_id }));
        };
        if self.requests[index].status != RequestStatus::AwaitingRead {
            tracing::debug!(target: "async_dmconfig::client", { dm.hop_id = hop_id, dm.status = ?self.requests[index].status }, "answer for unsent request");
            return Err(Error::protocol(ProtocolErrorKind::NotAwaitingRead { hop_id }));
        }
        self.requests
            .remove(index)
            .ok_or_else(|| Error::protocol(ProtocolErrorKind::UnknownHopId { hop_id }))
    }

    /// Remove every request, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = PendingRequest> + '_ {
        self.requests.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(u32, bool)>>>;

    fn request(hop: u32, log: &Log) -> PendingRequest {
        let log = log.clone();
        PendingRequest::new(
            hop,
            command::DB_GET,
            Bytes::from(vec![hop as u8; 4]),
            Box::new(move |r| log.lock().unwrap().push((hop, r.is_ok()))),
        )
    }

    #[test]
    fn test_written_in_registration_order() {
        let log = Log::default();
        let mut q = RequestQueue::new();
        for hop in [5, 3, 9] {
            q.push(request(hop, &log));
        }
        let order: Vec<u32> = std::iter::from_fn(|| q.next_to_write().map(|(h, _)| h)).collect();
        assert_eq!(order, vec![5, 3, 9]);
        assert!(!q.has_unwritten());
        assert_eq!(q.status(3), Some(RequestStatus::Writing));
    }

    #[test]
    fn test_answers_match_by_hop_id() {
        let log = Log::default();
        let mut q = RequestQueue::new();
        for hop in [1, 2, 3] {
            q.push(request(hop, &log));
            q.next_to_write();
            q.mark_awaiting_read(hop);
        }
        for hop in [3, 1, 2] {
            let r = q.take_answered(hop).unwrap();
            r.complete(Ok(Answer {
                command: command::DB_GET,
                group: None,
            }));
        }
        assert!(q.is_empty());
        assert_eq!(*log.lock().unwrap(), vec![(3, true), (1, true), (2, true)]);
    }

    #[test]
    fn test_unknown_and_unsent_hop_ids() {
        let log = Log::default();
        let mut q = RequestQueue::new();
        q.push(request(7, &log));

        let err = q.take_answered(8).unwrap_err();
        assert!(matches!(
            *err,
            Error::Protocol {
                kind: ProtocolErrorKind::UnknownHopId { hop_id: 8 }
            }
        ));
        let err = q.take_answered(7).unwrap_err();
        assert!(matches!(
            *err,
            Error::Protocol {
                kind: ProtocolErrorKind::NotAwaitingRead { hop_id: 7 }
            }
        ));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_drain_fails_everything() {
        let log = Log::default();
        let mut q = RequestQueue::new();
        q.push(request(1, &log));
        q.push(request(2, &log));
        for r in q.drain() {
            r.complete(Err(Error::NotConnected.boxed()));
        }
        assert!(q.is_empty());
        assert_eq!(*log.lock().unwrap(), vec![(1, false), (2, false)]);
    }
}
