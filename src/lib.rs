//! # async-dmconfig
//!
//! Async client engine for the dmconfig protocol spoken by TR-069 style
//! configuration daemons.
//!
//! ## Features
//!
//! - Diameter-style attribute (AVP) codec with nested groups
//! - Many outstanding requests multiplexed over one stream socket
//! - Server-pushed feedback (notifications, firmware update, ping,
//!   traceroute, packet capture) routed to per-feature callbacks
//! - Local (abstract-namespace or filesystem) unix sockets and TCP
//! - Async API on Tokio plus a blocking facade
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_dmconfig::{Connection, Value, ValueType};
//! use async_dmconfig::codes::session;
//! use async_dmconfig::transport::Endpoint;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<async_dmconfig::Error>> {
//!     let mut conn = Connection::builder(Endpoint::default()).connect().await?;
//!
//!     conn.start_session(session::READ | session::WRITE, None, None).await?;
//!     conn.set(&[("InternetGatewayDevice.LANDevice.1.Hosts.Enable", Value::Bool(true))])
//!         .await?;
//!     conn.commit().await?;
//!
//!     let values = conn
//!         .get(&[(ValueType::Unknown, "InternetGatewayDevice.DeviceInfo.UpTime")])
//!         .await?;
//!     println!("uptime: {}", values[0]);
//!
//!     conn.end_session().await?;
//!     Ok(())
//! }
//! ```

pub mod avp;
pub mod client;
pub mod codes;
pub mod decode;
pub mod error;
pub mod format;
pub mod notification;
pub mod packet;
pub mod transport;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

// Re-exports for convenience
pub use avp::{Avp, AvpCursor, AvpGroup, AvpHeader, AvpWrite};
pub use client::{
    AccessClassRequest, Answer, BlockingConnection, ClientConfig, Connection, ConnectionBuilder,
    ConnectionState, IdGenerator, Request,
};
pub use error::{
    ConnectionErrorKind, DecodeErrorKind, EncodeErrorKind, Error, ProtocolErrorKind, Result,
    ResultCode,
};
pub use notification::{Feature, Feedback, FeedbackEvent};
pub use packet::{Packet, PacketBuilder};
pub use transport::{Endpoint, Stream};
pub use value::{Value, ValueType};

/// Testing utilities exposed via the `testing` feature.
#[cfg(feature = "testing")]
pub mod testing {
    pub use crate::format::hex::{decode as decode_hex, encode as encode_hex};
}
