//! Error types for async-dmconfig.
//!
//! This module provides:
//!
//! - [`Error`] - The main error type covering all failure modes
//! - [`ResultCode`] - The caller-visible result classes (ok, allocation,
//!   connection, misc) plus codes returned by the server
//!
//! # Error Handling
//!
//! Errors are boxed for efficiency: `Result<T> = Result<T, Box<Error>>`.
//!
//! ```rust
//! use async_dmconfig::{Error, Result, ResultCode};
//!
//! fn handle_error(result: Result<()>) {
//!     match result {
//!         Ok(()) => println!("Success"),
//!         Err(e) => match e.result_code() {
//!             ResultCode::Connection => println!("connection lost: {}", e),
//!             ResultCode::Server(code) => println!("server refused with {}", code),
//!             _ => println!("Error: {}", e),
//!         },
//!     }
//! }
//! ```

pub(crate) mod internal;

use std::time::Duration;

pub use internal::{
    ConnectionErrorKind, DecodeErrorKind, EncodeErrorKind, ProtocolErrorKind, TimeoutPhase,
};

// Pattern for converting detailed internal errors to simplified public errors:
//
// tracing::debug!(
//     target: "async_dmconfig::avp",
//     { dm.offset = 42, dm.decode_error = %DecodeErrorKind::AvpTooShort { length: 4 } },
//     "decode error details here"
// );
// return Err(Error::Decode { offset, kind }.boxed());

/// Result type alias using the library's boxed Error type.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// The main error type for all async-dmconfig operations.
///
/// Errors are boxed (via [`Result`]) to keep the size small on the stack.
///
/// Every variant maps onto one of the caller-visible [`ResultCode`] classes:
///
/// ```
/// use async_dmconfig::{Error, ResultCode};
/// use async_dmconfig::error::ConnectionErrorKind;
///
/// let err = Error::Connection { kind: ConnectionErrorKind::PeerClosed, source: None };
/// assert_eq!(err.result_code(), ResultCode::Connection);
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Connection-level fault (reset, broken pipe, peer shutdown, refused).
    #[error("connection error: {kind}")]
    Connection {
        kind: ConnectionErrorKind,
        #[source]
        source: Option<std::io::Error>,
    },

    /// A phase timeout expired. Treated like a connection reset.
    #[error("timeout after {elapsed:?} while {phase}")]
    Timeout { phase: TimeoutPhase, elapsed: Duration },

    /// Buffer or group allocation failed.
    #[error("failed to allocate {requested} bytes")]
    Alloc { requested: usize },

    /// Malformed attribute or packet data.
    #[error("malformed data at offset {offset}: {kind}")]
    Decode { offset: usize, kind: DecodeErrorKind },

    /// Attribute group or packet could not be built.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Peer violated the request/answer protocol.
    #[error("protocol violation: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// The server answered with a non-zero result code.
    #[error("server returned {code}")]
    Server { code: ResultCode },

    /// Operation requires a connected socket.
    #[error("not connected")]
    NotConnected,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(Box<str>),
}

impl Error {
    /// Box this error (convenience for constructing boxed errors).
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    /// Collapse this error onto the result classes reported to callers.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } | Self::NotConnected => {
                ResultCode::Connection
            }
            Self::Alloc { .. } => ResultCode::Alloc,
            Self::Server { code } => *code,
            Self::Decode { .. } | Self::Encode { .. } | Self::Protocol { .. } | Self::Config(_) => {
                ResultCode::Misc
            }
        }
    }

    /// Whether this error tore down (or must tear down) the connection.
    pub fn is_connection_error(&self) -> bool {
        self.result_code() == ResultCode::Connection
    }

    /// Whether a request failed only because its connection was aborted.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Self::Connection {
                kind: ConnectionErrorKind::Aborted,
                ..
            }
        )
    }

    pub(crate) fn connection(kind: ConnectionErrorKind) -> Box<Self> {
        Self::Connection { kind, source: None }.boxed()
    }

    pub(crate) fn protocol(kind: ProtocolErrorKind) -> Box<Self> {
        Self::Protocol { kind }.boxed()
    }

    pub(crate) fn encode(kind: EncodeErrorKind) -> Box<Self> {
        Self::Encode { kind }.boxed()
    }

    pub(crate) fn decode(offset: usize, kind: DecodeErrorKind) -> Box<Self> {
        Self::Decode { offset, kind }.boxed()
    }
}

/// Result codes as seen by callers.
///
/// The first four classes are produced locally; [`ResultCode::Server`] carries
/// whatever non-zero code the server placed in an answer's result attribute.
///
/// # Example
///
/// ```
/// use async_dmconfig::ResultCode;
///
/// assert_eq!(ResultCode::from_u32(0), ResultCode::Ok);
/// assert_eq!(ResultCode::from_u32(0x1002).as_u32(), 0x1002);
/// println!("{}", ResultCode::Misc); // prints "misc"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Operation completed successfully.
    Ok,
    /// Allocation failure.
    Alloc,
    /// Connection error (reset, timeout, abort).
    Connection,
    /// Miscellaneous or protocol error.
    Misc,
    /// Non-zero code returned by the server.
    Server(u32),
}

impl ResultCode {
    /// Raw value of [`ResultCode::Ok`].
    pub const OK: u32 = 0;
    /// Raw value of [`ResultCode::Alloc`].
    pub const ERR_ALLOC: u32 = 1;
    /// Raw value of [`ResultCode::Connection`].
    pub const ERR_CONNECTION: u32 = 2;
    /// Raw value of [`ResultCode::Misc`].
    pub const ERR_MISC: u32 = 3;

    /// Create from a raw result code.
    ///
    /// Values outside the local classes are kept as [`ResultCode::Server`].
    pub fn from_u32(value: u32) -> Self {
        match value {
            Self::OK => Self::Ok,
            Self::ERR_ALLOC => Self::Alloc,
            Self::ERR_CONNECTION => Self::Connection,
            Self::ERR_MISC => Self::Misc,
            other => Self::Server(other),
        }
    }

    /// Convert to the raw result code.
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Ok => Self::OK,
            Self::Alloc => Self::ERR_ALLOC,
            Self::Connection => Self::ERR_CONNECTION,
            Self::Misc => Self::ERR_MISC,
            Self::Server(code) => *code,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Alloc => write!(f, "allocation failure"),
            Self::Connection => write!(f, "connection error"),
            Self::Misc => write!(f, "misc"),
            Self::Server(code) => write!(f, "server code {:#06x}", code),
        }
    }
}
