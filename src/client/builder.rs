//! Connection builder.
//!
//! This module provides the [`ConnectionBuilder`] type, the usual entry point
//! for opening a [`Connection`] with non-default timeouts or limits.

use std::sync::Arc;
use std::time::Duration;

use crate::client::{
    ClientConfig, Connection, DEFAULT_CHUNK_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_MAX_PACKET_SIZE, DEFAULT_REQUEST_TIMEOUT, IdGenerator,
};
use crate::codes;
use crate::error::{Error, Result};
use crate::packet::{HEADER_LEN, MAX_PACKET_LEN};
use crate::transport::{DEFAULT_CHUNK_SIZE, Endpoint};

use super::BlockingConnection;

/// Builder for [`Connection`]s.
///
/// # Example
///
/// ```rust,no_run
/// use async_dmconfig::{ConnectionBuilder, transport::Endpoint};
/// use std::time::Duration;
///
/// # async fn example() -> async_dmconfig::Result<()> {
/// // Local daemon with defaults
/// let conn = ConnectionBuilder::new(Endpoint::default()).connect().await?;
///
/// // Remote daemon, impatient
/// let conn = ConnectionBuilder::new("tcp:192.0.2.10:1100".parse()?)
///     .request_timeout(Duration::from_secs(10))
///     .chunk_timeout(Duration::from_secs(2))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionBuilder {
    endpoint: Endpoint,
    config: ClientConfig,
    ids: Option<Arc<IdGenerator>>,
}

impl ConnectionBuilder {
    /// Create a builder for `endpoint` with default settings.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            config: ClientConfig::default(),
            ids: None,
        }
    }

    /// Replace all settings at once.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the connect timeout (default: 10 seconds).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the chunk timeout (default: 5 seconds).
    ///
    /// Applies while a packet is partially received or partially sent, and
    /// bounds how long the peer may stall mid-packet.
    pub fn chunk_timeout(mut self, timeout: Duration) -> Self {
        self.config.chunk_timeout = timeout;
        self
    }

    /// Set the request timeout (default: 60 seconds).
    ///
    /// Applies while requests are outstanding and no packet is in transfer.
    /// Feedback-only waits have no timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the application id stamped on requests.
    pub fn app_id(mut self, app_id: u32) -> Self {
        self.config.app_id = app_id;
        self
    }

    /// Set the receive buffer growth step (default: 4096 bytes).
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Set the largest packet accepted from the server (default: 16 MiB).
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.config.max_packet_size = size;
        self
    }

    /// Allocate hop ids from `ids` instead of the process-wide generator.
    pub fn id_generator(mut self, ids: Arc<IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    fn validate(&self) -> Result<()> {
        let config = &self.config;
        if config.read_chunk_size == 0 {
            return Err(Error::Config("read chunk size must be non-zero".into()).boxed());
        }
        if config.max_packet_size < HEADER_LEN || config.max_packet_size > MAX_PACKET_LEN {
            return Err(Error::Config(
                format!(
                    "max packet size must be between {} and {} bytes",
                    HEADER_LEN, MAX_PACKET_LEN
                )
                .into(),
            )
            .boxed());
        }
        if config.app_id == 0 {
            tracing::debug!(target: "async_dmconfig::client", "zero application id");
        }
        for (name, value) in [
            ("connect", config.connect_timeout),
            ("chunk", config.chunk_timeout),
            ("request", config.request_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{} timeout must be non-zero", name).into()).boxed());
            }
        }
        Ok(())
    }

    /// Open the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid, or if the connect fails
    /// or times out.
    pub async fn connect(self) -> Result<Connection> {
        self.validate()?;
        let ids = self.ids.unwrap_or_else(IdGenerator::global);
        let mut conn = Connection::new(self.config, ids);
        conn.open(&self.endpoint).await?;
        Ok(conn)
    }

    /// Open a connection for use from synchronous code.
    pub fn connect_blocking(self) -> Result<BlockingConnection> {
        self.validate()?;
        BlockingConnection::open(self.endpoint, self.config, self.ids.unwrap_or_else(IdGenerator::global))
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new(Endpoint::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ConnectionBuilder::default();
        assert_eq!(builder.endpoint, Endpoint::Local("DMSERVER".into()));
        assert_eq!(builder.config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(builder.config.chunk_timeout, DEFAULT_CHUNK_TIMEOUT);
        assert_eq!(builder.config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(builder.config.app_id, codes::APP_ID);
        assert_eq!(builder.config.read_chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(builder.config.max_packet_size, DEFAULT_MAX_PACKET_SIZE);
        assert!(builder.ids.is_none());
    }

    #[test]
    fn test_builder_with_options() {
        let builder = ConnectionBuilder::new(Endpoint::default_tcp())
            .connect_timeout(Duration::from_secs(1))
            .chunk_timeout(Duration::from_secs(2))
            .request_timeout(Duration::from_secs(3))
            .app_id(7)
            .read_chunk_size(512)
            .max_packet_size(1 << 16)
            .id_generator(Arc::new(IdGenerator::starting_at(9)));

        assert_eq!(builder.config.connect_timeout, Duration::from_secs(1));
        assert_eq!(builder.config.chunk_timeout, Duration::from_secs(2));
        assert_eq!(builder.config.request_timeout, Duration::from_secs(3));
        assert_eq!(builder.config.app_id, 7);
        assert_eq!(builder.config.read_chunk_size, 512);
        assert_eq!(builder.config.max_packet_size, 1 << 16);
        assert!(builder.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let err = ConnectionBuilder::default()
            .read_chunk_size(0)
            .validate()
            .unwrap_err();
        assert!(matches!(*err, Error::Config(ref msg) if msg.contains("chunk size")));
    }

    #[test]
    fn test_validate_rejects_bad_packet_limit() {
        for size in [HEADER_LEN - 1, MAX_PACKET_LEN + 1] {
            let err = ConnectionBuilder::default()
                .max_packet_size(size)
                .validate()
                .unwrap_err();
            assert!(matches!(*err, Error::Config(ref msg) if msg.contains("max packet size")));
        }
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let err = ConnectionBuilder::default()
            .request_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(*err, Error::Config(ref msg) if msg.contains("request timeout")));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let dir = std::env::temp_dir().join(format!("dmconfig-missing-{}", std::process::id()));
        let err = ConnectionBuilder::new(Endpoint::Unix(dir))
            .connect()
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
    }
}
