//! Stream transport.
//!
//! Provides the [`Socket`] readiness abstraction, the [`Stream`] socket type
//! for local (abstract-namespace or filesystem) and TCP endpoints, and the
//! non-blocking packet [`Reassembler`] and [`WriteScheduler`] that run on top
//! of it.

mod read;
mod sigpipe;
mod write;

pub use read::{DEFAULT_CHUNK_SIZE, Reassembler, ReadStatus};
pub use write::{WriteScheduler, WriteStatus};

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Type};
use tokio::io::{Interest, Ready};
use tokio::net::{TcpStream, UnixStream};
use tokio::time::timeout;

use crate::error::internal::{ConnectionErrorKind, TimeoutPhase};
use crate::error::{Error, Result};

/// Abstract-namespace name the configuration daemon listens on.
pub const DEFAULT_LOCAL_NAME: &str = "DMSERVER";

/// TCP port the configuration daemon listens on.
pub const DEFAULT_PORT: u16 = 1100;

/// Where to reach the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endpoint {
    /// Linux abstract-namespace unix socket (no filesystem entry).
    Local(String),
    /// Filesystem unix socket.
    Unix(PathBuf),
    /// TCP endpoint.
    Tcp(SocketAddr),
}

impl Endpoint {
    /// TCP endpoint on the loopback address and the default port.
    pub fn default_tcp() -> Self {
        Self::Tcp(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)))
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Local(DEFAULT_LOCAL_NAME.to_owned())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(name) => write!(f, "local:{}", name),
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{}", addr),
        }
    }
}

/// Parse `local:NAME`, `unix:PATH`, `tcp:HOST:PORT` or a bare socket address.
///
/// ```
/// use async_dmconfig::transport::Endpoint;
///
/// let e: Endpoint = "tcp:127.0.0.1:1100".parse().unwrap();
/// assert_eq!(e, Endpoint::default_tcp());
/// assert_eq!("local:DMSERVER".parse::<Endpoint>().unwrap(), Endpoint::default());
/// ```
impl FromStr for Endpoint {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(name) = s.strip_prefix("local:") {
            return Ok(Self::Local(name.to_owned()));
        }
        if let Some(path) = s.strip_prefix("unix:") {
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        let addr = s.strip_prefix("tcp:").unwrap_or(s);
        let with_port = if addr.contains(':') {
            addr.to_owned()
        } else {
            format!("{}:{}", addr, DEFAULT_PORT)
        };
        with_port
            .parse::<SocketAddr>()
            .map(Self::Tcp)
            .map_err(|_| Error::Config(format!("invalid endpoint: {}", s).into()).boxed())
    }
}

/// Non-blocking socket driven by readiness events.
pub trait Socket: Send {
    /// Wait until the socket is ready for any of `interest`.
    fn ready(&self, interest: Interest) -> impl Future<Output = io::Result<Ready>> + Send;

    /// Read without blocking; `WouldBlock` when nothing is available.
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write without blocking; `WouldBlock` when the send buffer is full.
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Pending socket error (`SO_ERROR`), if any.
    fn take_error(&self) -> io::Result<Option<io::Error>>;
}

/// A connected stream socket.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl From<TcpStream> for Stream {
    fn from(s: TcpStream) -> Self {
        Self::Tcp(s)
    }
}

impl From<UnixStream> for Stream {
    fn from(s: UnixStream) -> Self {
        Self::Unix(s)
    }
}

impl Socket for Stream {
    async fn ready(&self, interest: Interest) -> io::Result<Ready> {
        match self {
            Self::Tcp(s) => s.ready(interest).await,
            Self::Unix(s) => s.ready(interest).await,
        }
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.try_read(buf),
            Self::Unix(s) => s.try_read(buf),
        }
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.try_write(buf),
            Self::Unix(s) => s.try_write(buf),
        }
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        match self {
            Self::Tcp(s) => s.take_error(),
            Self::Unix(s) => s.take_error(),
        }
    }
}

fn connect_failed(endpoint: &Endpoint, source: io::Error) -> Box<Error> {
    tracing::debug!(target: "async_dmconfig::transport", { dm.endpoint = %endpoint, error = %source }, "connect failed");
    Error::Connection {
        kind: ConnectionErrorKind::ConnectFailed,
        source: Some(source),
    }
    .boxed()
}

/// Open a non-blocking connection to `endpoint`.
///
/// The connect runs in the background; once the socket turns writable its
/// pending error is checked. `connect_timeout` bounds the whole operation.
pub async fn connect(endpoint: &Endpoint, connect_timeout: Duration) -> Result<Stream> {
    let attempt = async {
        match endpoint {
            Endpoint::Tcp(addr) => connect_tcp(*addr).await.map(Stream::Tcp),
            Endpoint::Unix(path) => UnixStream::connect(path).await.map(Stream::Unix),
            Endpoint::Local(name) => connect_abstract(name).map(Stream::Unix),
        }
    };
    let stream = timeout(connect_timeout, attempt)
        .await
        .map_err(|_| {
            tracing::debug!(target: "async_dmconfig::transport", { dm.endpoint = %endpoint }, "connect timed out");
            Error::Timeout {
                phase: TimeoutPhase::Connect,
                elapsed: connect_timeout,
            }
            .boxed()
        })?
        .map_err(|e| connect_failed(endpoint, e))?;

    if let Some(pending) = stream.take_error().map_err(|e| connect_failed(endpoint, e))? {
        return Err(connect_failed(endpoint, pending));
    }
    tracing::debug!(target: "async_dmconfig::transport", { dm.endpoint = %endpoint }, "connected");
    Ok(stream)
}

async fn connect_tcp(addr: SocketAddr) -> io::Result<TcpStream> {
    let socket = socket2::Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;
    socket.set_nodelay(true)?;
    match socket.connect(&SockAddr::from(addr)) {
        Ok(()) => {}
        Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
        Err(e) => return Err(e),
    }
    let stream = TcpStream::from_std(socket.into())?;
    stream.writable().await?;
    Ok(stream)
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &str) -> io::Result<UnixStream> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr as UnixAddr;

    let addr = UnixAddr::from_abstract_name(name.as_bytes())?;
    let stream = std::os::unix::net::UnixStream::connect_addr(&addr)?;
    stream.set_nonblocking(true)?;
    UnixStream::from_std(stream)
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_name: &str) -> io::Result<UnixStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract unix sockets require Linux",
    ))
}

/// Classify a socket error into the connection fault it represents.
pub(crate) fn connection_error(e: io::Error) -> Box<Error> {
    let kind = match e.kind() {
        io::ErrorKind::ConnectionReset | io::ErrorKind::TimedOut => ConnectionErrorKind::Reset,
        io::ErrorKind::BrokenPipe => ConnectionErrorKind::BrokenPipe,
        io::ErrorKind::UnexpectedEof => ConnectionErrorKind::PeerClosed,
        _ => ConnectionErrorKind::Io,
    };
    tracing::debug!(target: "async_dmconfig::transport", { dm.connection_error = %kind, error = %e }, "socket error");
    Error::Connection {
        kind,
        source: Some(e),
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_endpoint_parse() {
        assert_eq!(
            "unix:/run/dm.sock".parse::<Endpoint>().unwrap(),
            Endpoint::Unix(PathBuf::from("/run/dm.sock"))
        );
        assert_eq!(
            "127.0.0.1".parse::<Endpoint>().unwrap(),
            Endpoint::default_tcp()
        );
        assert!("tcp:not an address".parse::<Endpoint>().is_err());
        assert_eq!(Endpoint::default().to_string(), "local:DMSERVER");
    }

    #[tokio::test]
    async fn test_tcp_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { listener.accept().await.unwrap() });

        let stream = connect(&Endpoint::Tcp(addr), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(matches!(stream, Stream::Tcp(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_connect_refused() {
        // Bind then drop to obtain a port with no listener.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect(&Endpoint::Tcp(addr), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_abstract_connect() {
        use std::os::linux::net::SocketAddrExt;

        let name = format!("async-dmconfig-test-{}", std::process::id());
        let addr = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes()).unwrap();
        let listener = std::os::unix::net::UnixListener::bind_addr(&addr).unwrap();

        let stream = connect(&Endpoint::Local(name), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(matches!(stream, Stream::Unix(_)));
        listener.accept().unwrap();
    }
}
