//! Detailed error kinds.
//!
//! These are carried inside the public [`Error`](super::Error) variants and
//! logged through `tracing` at the point of failure.

use std::fmt;

/// Why a connection was torn down or could not be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionErrorKind {
    /// Peer closed the stream (zero-byte read or write).
    PeerClosed,
    /// Connection reset by peer.
    Reset,
    /// Write on a stream whose reading side is gone.
    BrokenPipe,
    /// Non-blocking connect reported a pending socket error.
    ConnectFailed,
    /// Unexpected I/O failure on the socket.
    Io,
    /// Request was pending when the connection was aborted.
    Aborted,
    /// Connection ended before the request could complete.
    Closed,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed the connection"),
            Self::Reset => write!(f, "connection reset"),
            Self::BrokenPipe => write!(f, "broken pipe"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::Io => write!(f, "socket I/O failure"),
            Self::Aborted => write!(f, "connection aborted"),
            Self::Closed => write!(f, "connection closed"),
        }
    }
}

/// Which phase of the connection lifecycle timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// Waiting for the non-blocking connect to complete.
    Connect,
    /// Waiting for the rest of a partially transferred packet.
    Chunk,
    /// Waiting for a whole request to be written or its answer read.
    Request,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connecting"),
            Self::Chunk => write!(f, "transferring a packet chunk"),
            Self::Request => write!(f, "waiting for a request to complete"),
        }
    }
}

/// Detailed decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// Attribute header or payload runs past the end of the group.
    Truncated { needed: usize, available: usize },
    /// Declared attribute length below the header size.
    AvpTooShort { length: usize },
    /// Reserved attribute flag bits set.
    ReservedAvpFlags { flags: u8 },
    /// Group ended where an attribute was required.
    EndOfGroup,
    /// Attribute code differs from the one required at this position.
    UnexpectedCode { expected: u32, actual: u32 },
    /// Payload width does not match the requested type.
    InvalidLength { code: u32, expected: usize, actual: usize },
    /// Cursor was expected to be exhausted.
    TrailingData { remaining: usize },
    /// Address family tag is neither IPv4 nor IPv6.
    UnknownAddressFamily(u16),
    /// String payload is not valid UTF-8.
    InvalidUtf8 { code: u32 },
    /// Packet header version is not supported.
    UnknownVersion(u8),
    /// Reserved command flag bits set.
    ReservedCommandFlags { flags: u8 },
    /// Declared packet length below the header size.
    PacketTooShort { length: usize },
    /// Declared packet length exceeds the configured maximum.
    PacketTooLarge { length: usize, max: usize },
    /// Declared packet length disagrees with the received bytes.
    PacketLengthMismatch { declared: usize, actual: usize },
    /// Enumerated value out of range.
    InvalidEnum { code: u32, value: u32 },
    /// Container attribute without a body where one is required.
    EmptyContainer { code: u32 },
    /// Containers nested deeper than the decoder accepts.
    NestingTooDeep { max: usize },
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, available } => {
                write!(f, "truncated: need {} bytes, have {}", needed, available)
            }
            Self::AvpTooShort { length } => write!(f, "attribute length {} too short", length),
            Self::ReservedAvpFlags { flags } => {
                write!(f, "reserved attribute flags set: {:#04x}", flags)
            }
            Self::EndOfGroup => write!(f, "unexpected end of group"),
            Self::UnexpectedCode { expected, actual } => {
                write!(f, "expected attribute {}, got {}", expected, actual)
            }
            Self::InvalidLength {
                code,
                expected,
                actual,
            } => write!(
                f,
                "attribute {} has length {}, expected {}",
                code, actual, expected
            ),
            Self::TrailingData { remaining } => {
                write!(f, "{} trailing bytes after last attribute", remaining)
            }
            Self::UnknownAddressFamily(family) => write!(f, "unknown address family {}", family),
            Self::InvalidUtf8 { code } => write!(f, "attribute {} is not valid UTF-8", code),
            Self::UnknownVersion(v) => write!(f, "unknown packet version {}", v),
            Self::ReservedCommandFlags { flags } => {
                write!(f, "reserved command flags set: {:#04x}", flags)
            }
            Self::PacketTooShort { length } => write!(f, "packet length {} too short", length),
            Self::PacketTooLarge { length, max } => {
                write!(f, "packet length {} exceeds maximum {}", length, max)
            }
            Self::PacketLengthMismatch { declared, actual } => write!(
                f,
                "packet declares {} bytes but {} were received",
                declared, actual
            ),
            Self::InvalidEnum { code, value } => {
                write!(f, "attribute {} carries invalid value {}", code, value)
            }
            Self::EmptyContainer { code } => write!(f, "container attribute {} is empty", code),
            Self::NestingTooDeep { max } => write!(f, "containers nested deeper than {}", max),
        }
    }
}

/// Detailed encode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodeErrorKind {
    /// Embedded group holds a mandatory attribute but the container is not mandatory.
    MandatoryInOptionalGroup { code: u32 },
    /// Attribute or packet length does not fit the 24-bit length field.
    TooLong { length: usize },
    /// `end_group` without matching `begin_group`.
    NoOpenGroup,
    /// Packet finished while a nested group was still open.
    UnclosedGroup { depth: usize },
    /// Nesting deeper than the supported maximum.
    NestingTooDeep { max: usize },
    /// Command code does not fit in 24 bits.
    CommandCodeTooLarge { code: u32 },
}

impl fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MandatoryInOptionalGroup { code } => write!(
                f,
                "group {} contains a mandatory attribute but is not mandatory",
                code
            ),
            Self::TooLong { length } => write!(f, "length {} exceeds 24-bit field", length),
            Self::NoOpenGroup => write!(f, "no open group to close"),
            Self::UnclosedGroup { depth } => write!(f, "{} group(s) left open", depth),
            Self::NestingTooDeep { max } => write!(f, "group nesting exceeds {}", max),
            Self::CommandCodeTooLarge { code } => {
                write!(f, "command code {:#x} exceeds 24 bits", code)
            }
        }
    }
}

/// Request/answer protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolErrorKind {
    /// Answer hop id matches no pending request.
    UnknownHopId { hop_id: u32 },
    /// Answer arrived for a request that has not been fully written.
    NotAwaitingRead { hop_id: u32 },
    /// Answer lacks a well-formed leading result-code attribute.
    MissingResultCode,
    /// Answer body is neither empty nor a container.
    UnexpectedAttribute { code: u32 },
    /// Server-initiated packet with an unrecognized command code.
    UnknownCommand { code: u32 },
    /// Server-initiated packet for a feature nobody registered.
    UnregisteredFeedback { code: u32 },
    /// Answer body lacks a field the command requires.
    MissingField { code: u32 },
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownHopId { hop_id } => write!(f, "answer for unknown hop id {:#010x}", hop_id),
            Self::NotAwaitingRead { hop_id } => {
                write!(f, "answer for unsent request {:#010x}", hop_id)
            }
            Self::MissingResultCode => write!(f, "answer without result code"),
            Self::UnexpectedAttribute { code } => {
                write!(f, "unexpected attribute {} in answer", code)
            }
            Self::UnknownCommand { code } => write!(f, "unknown server command {}", code),
            Self::UnregisteredFeedback { code } => {
                write!(f, "no handler registered for server command {}", code)
            }
            Self::MissingField { code } => write!(f, "answer lacks attribute {}", code),
        }
    }
}
