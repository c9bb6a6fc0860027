//! Client connection to the configuration daemon.
//!
//! A [`Connection`] owns one stream socket and multiplexes any number of
//! outstanding requests over it. Requests are written in registration order,
//! answers are matched back by hop id, and server-initiated packets are routed
//! to the [`FeedbackRegistry`].
//!
//! Nothing happens in the background: the connection makes progress only
//! while [`Connection::process_events`] (or a helper built on it, such as
//! [`Connection::send_request`] or [`Connection::run`]) is being awaited.

mod blocking;
mod builder;
mod commands;
mod id;
mod ops;
mod request;

pub use blocking::BlockingConnection;
pub use builder::ConnectionBuilder;
pub use commands::{AccessClassRequest, Request};
pub use id::IdGenerator;
pub use request::{Answer, AnswerHandler, PendingRequest, RequestQueue, RequestStatus};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::Interest;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::instrument;

use crate::avp::{AvpGroup, AvpWrite};
use crate::codes::{self, avp, command};
use crate::error::internal::{ConnectionErrorKind, ProtocolErrorKind, TimeoutPhase};
use crate::error::{Error, Result, ResultCode};
use crate::notification::{Feature, Feedback, FeedbackRegistry};
use crate::packet::{CommandFlags, MAX_PACKET_LEN, Packet, PacketBuilder};
use crate::transport::{
    self, DEFAULT_CHUNK_SIZE, Endpoint, Reassembler, Socket, Stream, WriteScheduler, WriteStatus,
};

/// Default time allowed for establishing the connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed between chunks of a partially transferred packet.
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for outstanding requests to make progress.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default largest packet accepted from the server.
pub const DEFAULT_MAX_PACKET_SIZE: usize = MAX_PACKET_LEN;

/// Connection configuration.
///
/// Most users should use [`ConnectionBuilder`] rather than constructing this
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    /// Connect timeout (default: 10 seconds)
    pub connect_timeout: Duration,
    /// Timeout while a packet is partially read or written (default: 5 seconds)
    pub chunk_timeout: Duration,
    /// Timeout while requests are outstanding (default: 60 seconds)
    pub request_timeout: Duration,
    /// Application id placed in request headers
    pub app_id: u32,
    /// Growth step of the receive buffer (default: 4096)
    pub read_chunk_size: usize,
    /// Largest packet accepted from the server (default: 16 MiB)
    pub max_packet_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            app_id: codes::APP_ID,
            read_chunk_size: DEFAULT_CHUNK_SIZE,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket.
    Disconnected,
    /// Connect in progress.
    Connecting,
    /// Connected; nothing to write and nothing expected.
    Idle,
    /// Connected with requests outstanding or feedback registered.
    Active,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Idle => "idle",
            Self::Active => "active",
        };
        f.write_str(name)
    }
}

/// A connection to the configuration daemon.
///
/// Generic over the socket type, with [`Stream`] as default.
///
/// # Example
///
/// ```rust,no_run
/// use async_dmconfig::{Connection, Value, ValueType};
/// use async_dmconfig::codes::session;
///
/// # async fn example() -> async_dmconfig::Result<()> {
/// let mut conn = Connection::builder(Default::default()).connect().await?;
/// conn.start_session(session::READ, None, None).await?;
/// let values = conn
///     .get(&[(ValueType::String, "InternetGatewayDevice.DeviceInfo.SoftwareVersion")])
///     .await?;
/// println!("{}", values[0]);
/// conn.end_session().await?;
/// # Ok(())
/// # }
/// ```
pub struct Connection<S: Socket = Stream> {
    socket: Option<S>,
    reader: Reassembler,
    writer: WriteScheduler,
    requests: RequestQueue,
    feedback: FeedbackRegistry,
    session_id: u32,
    config: ClientConfig,
    ids: Arc<IdGenerator>,
    state: ConnectionState,
}

impl Connection<Stream> {
    /// Create a connection builder.
    pub fn builder(endpoint: Endpoint) -> ConnectionBuilder {
        ConnectionBuilder::new(endpoint)
    }

    /// Connect to `endpoint` with `config`.
    pub async fn connect(endpoint: &Endpoint, config: ClientConfig) -> Result<Self> {
        let mut conn = Self::new(config, IdGenerator::global());
        conn.open(endpoint).await?;
        Ok(conn)
    }

    /// Open the socket of a disconnected connection.
    #[instrument(level = "debug", skip_all, fields(dm.endpoint = %endpoint))]
    pub async fn open(&mut self, endpoint: &Endpoint) -> Result<()> {
        if self.socket.is_some() {
            return Err(Error::Config("connection is already open".into()).boxed());
        }
        self.state = ConnectionState::Connecting;
        match transport::connect(endpoint, self.config.connect_timeout).await {
            Ok(stream) => {
                self.socket = Some(stream);
                self.state = ConnectionState::Idle;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }
}

impl<S: Socket> Connection<S> {
    /// Create a disconnected connection.
    pub fn new(config: ClientConfig, ids: Arc<IdGenerator>) -> Self {
        Self {
            socket: None,
            reader: Reassembler::new(config.read_chunk_size, config.max_packet_size),
            writer: WriteScheduler::new(),
            requests: RequestQueue::new(),
            feedback: FeedbackRegistry::new(),
            session_id: 0,
            config,
            ids,
            state: ConnectionState::Disconnected,
        }
    }

    /// Wrap an already connected socket.
    pub fn from_socket(socket: S, config: ClientConfig) -> Self {
        Self::from_socket_with_ids(socket, config, IdGenerator::global())
    }

    /// Wrap an already connected socket, allocating ids from `ids`.
    pub fn from_socket_with_ids(socket: S, config: ClientConfig, ids: Arc<IdGenerator>) -> Self {
        let mut conn = Self::new(config, ids);
        conn.socket = Some(socket);
        conn.state = ConnectionState::Idle;
        conn
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session id sent with every request (0 outside a session).
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Override the session id, e.g. to join a session started elsewhere.
    pub fn set_session_id(&mut self, session_id: u32) {
        self.session_id = session_id;
    }

    /// Number of requests not yet answered.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn feedback(&self) -> &FeedbackRegistry {
        &self.feedback
    }

    /// Install the callback for `feature`, replacing any previous one.
    pub fn register_feedback<F>(&mut self, feature: Feature, handler: F)
    where
        F: FnMut(Feedback) + Send + 'static,
    {
        self.feedback.register(feature, handler);
        self.refresh_state();
    }

    /// Release the slot of `feature`.
    pub fn clear_feedback(&mut self, feature: Feature) -> bool {
        let cleared = self.feedback.clear(feature);
        self.refresh_state();
        cleared
    }

    /// Queue a request; `handler` runs exactly once with its outcome.
    ///
    /// The packet carries the current session id followed by `group` wrapped
    /// in a container attribute. Returns the hop id assigned to the request.
    #[instrument(level = "debug", skip_all, fields(dm.command = command::name(code), dm.hop_id = tracing::field::Empty))]
    pub fn register_request<F>(&mut self, code: u32, group: Option<&AvpGroup>, handler: F) -> Result<u32>
    where
        F: FnOnce(Result<Answer>) + Send + 'static,
    {
        if self.socket.is_none() {
            return Err(Error::NotConnected.boxed());
        }
        let hop_id = self.ids.next_id();
        tracing::Span::current().record("dm.hop_id", hop_id);

        let mut builder = PacketBuilder::new(code, CommandFlags::REQUEST, self.config.app_id, hop_id, hop_id)?;
        builder.put_u32(avp::SESSIONID, self.session_id)?;
        if let Some(group) = group {
            builder.put_group(avp::CONTAINER, group)?;
        }
        let packet = builder.finish()?;
        tracing::trace!(target: "async_dmconfig::client", { dm.bytes = packet.len(), dm.session_id = self.session_id }, "request built");

        self.requests
            .push(PendingRequest::new(hop_id, code, packet, Box::new(handler)));
        self.state = ConnectionState::Active;
        Ok(hop_id)
    }

    /// Queue a prepared [`Request`].
    pub fn register<F>(&mut self, request: &Request, handler: F) -> Result<u32>
    where
        F: FnOnce(Result<Answer>) + Send + 'static,
    {
        self.register_request(request.code, request.body.as_ref(), handler)
    }

    /// Send a request and wait for its answer.
    ///
    /// Other requests and feedback are processed while waiting.
    pub async fn send_request(&mut self, code: u32, group: Option<&AvpGroup>) -> Result<Answer> {
        let (tx, mut rx) = oneshot::channel();
        self.register_request(code, group, move |result| {
            let _ = tx.send(result);
        })?;
        loop {
            match rx.try_recv() {
                Ok(result) => return result,
                Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(Error::connection(ConnectionErrorKind::Aborted));
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
            if let Err(e) = self.process_events().await {
                // The answer may have been dispatched before the failure.
                return match rx.try_recv() {
                    Ok(Err(failed)) if failed.is_abort() => Err(e),
                    Ok(result) => result,
                    Err(_) => Err(e),
                };
            }
        }
    }

    /// Send a prepared [`Request`] and wait for its answer.
    pub async fn send(&mut self, request: &Request) -> Result<Answer> {
        self.send_request(request.code, request.body.as_ref()).await
    }

    fn interest(&self) -> Option<Interest> {
        let write = self.writer.is_busy() || self.requests.has_unwritten();
        let read = !self.requests.is_empty() || self.feedback.any() || self.reader.has_partial();
        match (read, write) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }

    fn phase_timeout(&self) -> Option<(TimeoutPhase, Duration)> {
        if self.reader.has_partial() || self.writer.is_partial() {
            Some((TimeoutPhase::Chunk, self.config.chunk_timeout))
        } else if !self.requests.is_empty() {
            Some((TimeoutPhase::Request, self.config.request_timeout))
        } else {
            None
        }
    }

    fn refresh_state(&mut self) -> ConnectionState {
        self.state = if self.socket.is_none() {
            ConnectionState::Disconnected
        } else if self.interest().is_some() {
            ConnectionState::Active
        } else {
            ConnectionState::Idle
        };
        self.state
    }

    /// Run one iteration of the event loop.
    ///
    /// Waits until the socket is ready for what the connection needs, under
    /// the timeout of the current phase, then writes queued requests and
    /// processes every complete packet received. Returns the resulting state;
    /// [`ConnectionState::Idle`] means nothing is left to do.
    ///
    /// Any connection, timeout or protocol failure aborts the connection
    /// before the error is returned.
    pub async fn process_events(&mut self) -> Result<ConnectionState> {
        let Some(interest) = self.interest() else {
            return Ok(self.refresh_state());
        };
        let Some(socket) = self.socket.as_ref() else {
            return Err(Error::NotConnected.boxed());
        };

        let ready = match self.phase_timeout() {
            Some((phase, limit)) => {
                let waited = timeout(limit, socket.ready(interest)).await;
                match waited {
                    Ok(ready) => ready,
                    Err(_) => {
                        tracing::debug!(target: "async_dmconfig::client", { dm.phase = %phase, dm.pending = self.requests.len() }, "phase timeout");
                        return Err(self.abort(
                            Error::Timeout {
                                phase,
                                elapsed: limit,
                            }
                            .boxed(),
                        ));
                    }
                }
            }
            None => socket.ready(interest).await,
        };
        let ready = match ready {
            Ok(ready) => ready,
            Err(e) => return Err(self.abort(transport::connection_error(e))),
        };

        if ready.is_writable() {
            if let Err(e) = self.on_writable() {
                return Err(self.abort(e));
            }
        }
        if ready.is_readable() || ready.is_read_closed() {
            if let Err(e) = self.on_readable() {
                return Err(self.abort(e));
            }
        }
        Ok(self.refresh_state())
    }

    /// Process events until nothing is outstanding.
    ///
    /// With feedback registered this keeps running until every feature has
    /// delivered its terminal event (or its slot was cleared).
    pub async fn run(&mut self) -> Result<()> {
        while self.process_events().await? != ConnectionState::Idle {}
        Ok(())
    }

    fn on_writable(&mut self) -> Result<()> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(Error::NotConnected.boxed());
        };
        loop {
            if !self.writer.is_busy() {
                let Some((hop_id, packet)) = self.requests.next_to_write() else {
                    break;
                };
                self.writer.start(hop_id, packet);
            }
            let hop_id = self.writer.hop_id();
            match self.writer.write(|buf| socket.try_write(buf))? {
                WriteStatus::Complete => {
                    if let Some(hop_id) = hop_id {
                        tracing::trace!(target: "async_dmconfig::client", { dm.hop_id = hop_id }, "request written");
                        self.requests.mark_awaiting_read(hop_id);
                    }
                }
                WriteStatus::Incomplete | WriteStatus::Nothing => break,
            }
        }
        Ok(())
    }

    fn on_readable(&mut self) -> Result<()> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(Error::NotConnected.boxed());
        };
        self.reader.fill(|buf| socket.try_read(buf))?;
        while let Some(packet) = self.reader.next_packet()? {
            self.handle_packet(packet)?;
        }
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) -> Result<()> {
        tracing::trace!(target: "async_dmconfig::client", { dm.command = packet.command_name(), dm.hop_id = packet.hop_id(), dm.request = packet.is_request() }, "packet received");
        if packet.is_request() {
            return self.feedback.dispatch_packet(&packet);
        }
        let request = self.requests.take_answered(packet.hop_id())?;
        let result = self.evaluate_answer(request.code, &packet);
        if let Err(e) = &result {
            tracing::debug!(target: "async_dmconfig::client", { dm.hop_id = request.hop_id, dm.command = command::name(request.code), error = %e }, "request failed");
        }
        request.complete(result);
        Ok(())
    }

    /// Interpret an answer for the request with command `code`.
    fn evaluate_answer(&mut self, code: u32, packet: &Packet) -> Result<Answer> {
        let mut avps = packet.avps();
        let rc = match avps.next_avp() {
            Ok(Some(attr)) if attr.code == avp::RC && attr.data.len() == 4 => attr.as_u32()?,
            _ => {
                tracing::debug!(target: "async_dmconfig::client", { dm.hop_id = packet.hop_id() }, "answer without result code");
                return Err(Error::protocol(ProtocolErrorKind::MissingResultCode));
            }
        };

        if rc != ResultCode::OK {
            if let Some(feature) = Feature::started_by(code) {
                self.feedback.clear(feature);
            }
            return Err(Error::Server {
                code: ResultCode::from_u32(rc),
            }
            .boxed());
        }

        match code {
            command::UNSUBSCRIBE_NOTIFY | command::UNSUBSCRIBE_GW_NOTIFY => {
                self.feedback.clear(Feature::ActiveNotify);
            }
            command::END_SESSION => {
                self.feedback.clear_all();
                self.session_id = 0;
            }
            _ => {}
        }

        let group = match avps.next_avp()? {
            None => None,
            Some(attr) if attr.code == avp::CONTAINER => Some(attr.as_group()),
            Some(attr) => {
                tracing::debug!(target: "async_dmconfig::client", { dm.code = attr.code }, "unexpected attribute in answer");
                return Err(Error::protocol(ProtocolErrorKind::UnexpectedAttribute {
                    code: attr.code,
                }));
            }
        };

        if matches!(code, command::START_SESSION | command::SWITCH_SESSION) {
            let Some(body) = &group else {
                return Err(Error::protocol(ProtocolErrorKind::MissingField {
                    code: avp::SESSIONID,
                }));
            };
            self.session_id = body.clone().expect(avp::SESSIONID)?.as_u32()?;
            tracing::debug!(target: "async_dmconfig::client", { dm.session_id = self.session_id }, "session established");
        }

        Ok(Answer {
            command: code,
            group,
        })
    }

    /// Tear the connection down after `cause`.
    ///
    /// Every pending request fails with a connection error, all feedback
    /// slots are released, buffers are dropped and the socket is closed.
    /// Returns `cause` for convenient propagation.
    pub fn abort(&mut self, cause: Box<Error>) -> Box<Error> {
        tracing::warn!(target: "async_dmconfig::client", { dm.pending = self.requests.len(), error = %cause }, "aborting connection");
        self.socket = None;
        self.reader.reset();
        self.writer.reset();
        self.feedback.clear_all();
        self.session_id = 0;
        self.state = ConnectionState::Disconnected;
        for request in self.requests.drain() {
            request.complete(Err(Error::connection(ConnectionErrorKind::Aborted)));
        }
        cause
    }

    /// Close the connection, failing anything still pending.
    pub fn close(&mut self) {
        if self.socket.is_some() || !self.requests.is_empty() {
            self.abort(Error::connection(ConnectionErrorKind::Closed));
        }
    }
}

impl<S: Socket> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("session_id", &self.session_id)
            .field("pending", &self.requests.len())
            .field("feedback", &self.feedback)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::session;
    use crate::packet::HEADER_LEN;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;

    fn pair() -> (Connection, UnixStream) {
        let (client, server) = UnixStream::pair().unwrap();
        let conn = Connection::from_socket_with_ids(
            Stream::from(client),
            ClientConfig::default(),
            Arc::new(IdGenerator::starting_at(500)),
        );
        (conn, server)
    }

    async fn read_packet(server: &mut UnixStream) -> Packet {
        let mut header = [0u8; HEADER_LEN];
        server.read_exact(&mut header).await.unwrap();
        let len = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
        let mut raw = header.to_vec();
        raw.resize(len, 0);
        server.read_exact(&mut raw[HEADER_LEN..]).await.unwrap();
        Packet::decode(raw.into()).unwrap()
    }

    fn answer(code: u32, hop: u32, rc: u32, fill: impl FnOnce(&mut PacketBuilder)) -> Vec<u8> {
        let mut b = PacketBuilder::new(code, CommandFlags::empty(), codes::APP_ID, hop, hop).unwrap();
        b.put_u32(avp::RC, rc).unwrap();
        fill(&mut b);
        b.finish().unwrap().to_vec()
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.chunk_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.app_id, codes::APP_ID);
    }

    #[tokio::test]
    async fn test_register_requires_socket() {
        let mut conn: Connection = Connection::new(ClientConfig::default(), IdGenerator::global());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        let err = conn
            .register_request(command::DB_COMMIT, None, |_| {})
            .unwrap_err();
        assert!(matches!(*err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_request_layout() {
        let (mut conn, mut server) = pair();
        conn.set_session_id(77);
        let mut body = AvpGroup::new();
        body.put_str(avp::PATH, "Device.").unwrap();
        let hop = conn
            .register_request(command::DB_DUMP, Some(&body), |_| {})
            .unwrap();
        assert_eq!(hop, 500);
        assert_eq!(conn.state(), ConnectionState::Active);
        conn.process_events().await.unwrap();

        let packet = read_packet(&mut server).await;
        assert!(packet.is_request());
        assert_eq!(packet.code(), command::DB_DUMP);
        assert_eq!(packet.header.app_id, codes::APP_ID);
        assert_eq!(packet.header.end_id, 500);
        let mut avps = packet.avps();
        let sid = avps.expect(avp::SESSIONID).unwrap();
        assert_eq!(sid.flags, crate::avp::AvpFlags::VENDOR);
        assert_eq!(sid.vendor_id, Some(codes::vendor::TRAVELPING));
        assert_eq!(sid.as_u32().unwrap(), 77);
        let mut inner = avps.expect(avp::CONTAINER).unwrap().as_group();
        assert_eq!(inner.expect(avp::PATH).unwrap().as_str().unwrap(), "Device.");
        avps.assert_end().unwrap();
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (mut conn, mut server) = pair();
        let srv = tokio::spawn(async move {
            let start = read_packet(&mut server).await;
            let reply = answer(command::START_SESSION, start.hop_id(), 0, |b| {
                b.begin_group(avp::CONTAINER).unwrap();
                b.put_u32(avp::SESSIONID, 4242).unwrap();
                b.end_group().unwrap();
            });
            server.write_all(&reply).await.unwrap();

            let end = read_packet(&mut server).await;
            let mut avps = end.avps();
            assert_eq!(avps.expect(avp::SESSIONID).unwrap().as_u32().unwrap(), 4242);
            server
                .write_all(&answer(command::END_SESSION, end.hop_id(), 0, |_| {}))
                .await
                .unwrap();
            server
        });

        conn.start_session(session::READ, None, None).await.unwrap();
        assert_eq!(conn.session_id(), 4242);
        conn.register_feedback(Feature::Ping, |_| {});
        conn.end_session().await.unwrap();
        assert_eq!(conn.session_id(), 0);
        assert!(!conn.feedback().any());
        assert_eq!(conn.state(), ConnectionState::Idle);
        srv.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_clears_feature_slot() {
        let (mut conn, mut server) = pair();
        let srv = tokio::spawn(async move {
            let req = read_packet(&mut server).await;
            server
                .write_all(&answer(command::DEV_PING, req.hop_id(), 0x10, |_| {}))
                .await
                .unwrap();
            server
        });
        let err = conn.ping("192.0.2.1", 1, 1, |_| {}).await.unwrap_err();
        assert_eq!(err.result_code(), ResultCode::Server(0x10));
        assert!(!conn.feedback().is_registered(Feature::Ping));
        srv.await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_result_code_fails_only_the_request() {
        let (mut conn, mut server) = pair();
        let srv = tokio::spawn(async move {
            let req = read_packet(&mut server).await;
            let mut b = PacketBuilder::new(command::DB_COMMIT, CommandFlags::empty(), 0, req.hop_id(), req.hop_id()).unwrap();
            b.put_str(avp::STRING, "no rc").unwrap();
            server.write_all(&b.finish().unwrap()).await.unwrap();
            server
        });
        let err = conn.commit().await.unwrap_err();
        assert!(matches!(
            *err,
            Error::Protocol {
                kind: ProtocolErrorKind::MissingResultCode
            }
        ));
        assert_eq!(conn.state(), ConnectionState::Idle);
        srv.await.unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_body_attribute() {
        let (mut conn, mut server) = pair();
        let srv = tokio::spawn(async move {
            let req = read_packet(&mut server).await;
            let reply = answer(command::DB_COMMIT, req.hop_id(), 0, |b| {
                b.put_str(avp::STRING, "stray").unwrap();
            });
            server.write_all(&reply).await.unwrap();
            server
        });
        let err = conn.commit().await.unwrap_err();
        assert!(matches!(
            *err,
            Error::Protocol {
                kind: ProtocolErrorKind::UnexpectedAttribute { code: avp::STRING }
            }
        ));
        srv.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_aborts() {
        let (mut conn, _server) = pair();
        let err = conn.commit().await.unwrap_err();
        assert!(matches!(
            *err,
            Error::Timeout {
                phase: TimeoutPhase::Request,
                ..
            }
        ));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_peer_close_fails_pending() {
        let (mut conn, server) = pair();
        let (tx, rx) = oneshot::channel();
        conn.register_request(command::DB_SAVE, None, move |r| {
            let _ = tx.send(r);
        })
        .unwrap();
        drop(server);

        while conn.process_events().await.is_ok() {}
        let result = rx.await.unwrap();
        assert!(matches!(
            *result.unwrap_err(),
            Error::Connection {
                kind: ConnectionErrorKind::Aborted,
                ..
            }
        ));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.pending_requests(), 0);
    }
}
