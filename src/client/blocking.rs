//! Synchronous wrapper around [`Connection`].

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::avp::{AvpCursor, AvpGroup};
use crate::decode::{AccessClassReply, CfgSessionInfo, Node};
use crate::error::{Error, Result};
use crate::notification::Feedback;
use crate::transport::Endpoint;
use crate::value::{Value, ValueType};

use super::{AccessClassRequest, Answer, ClientConfig, Connection, ConnectionState, IdGenerator};

/// A [`Connection`] driven by its own current-thread runtime.
///
/// Every call blocks the calling thread until the answer arrives. Must not be
/// used from within an async context.
///
/// # Example
///
/// ```rust,no_run
/// use async_dmconfig::{ConnectionBuilder, ValueType};
/// use async_dmconfig::codes::session;
///
/// # fn main() -> async_dmconfig::Result<()> {
/// let mut conn = ConnectionBuilder::default().connect_blocking()?;
/// conn.start_session(session::READ, None, None)?;
/// let version = conn.get(&[(ValueType::String, "InternetGatewayDevice.DeviceInfo.SoftwareVersion")])?;
/// conn.end_session()?;
/// # Ok(())
/// # }
/// ```
pub struct BlockingConnection {
    runtime: Runtime,
    conn: Connection,
}

macro_rules! blocking {
    ($(#[$meta:meta])* $name:ident($($arg:ident: $ty:ty),*) -> $ret:ty) => {
        $(#[$meta])*
        pub fn $name(&mut self, $($arg: $ty),*) -> Result<$ret> {
            self.runtime.block_on(self.conn.$name($($arg),*))
        }
    };
}

macro_rules! blocking_feedback {
    ($(#[$meta:meta])* $name:ident($($arg:ident: $ty:ty),*)) => {
        $(#[$meta])*
        pub fn $name<F>(&mut self, $($arg: $ty,)* callback: F) -> Result<()>
        where
            F: FnMut(Feedback) + Send + 'static,
        {
            self.runtime.block_on(self.conn.$name($($arg,)* callback))
        }
    };
}

impl BlockingConnection {
    pub(crate) fn open(endpoint: Endpoint, config: ClientConfig, ids: Arc<IdGenerator>) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to start runtime: {}", e).into()).boxed())?;
        let conn = runtime.block_on(async {
            let mut conn = Connection::new(config, ids);
            conn.open(&endpoint).await?;
            Ok::<_, Box<Error>>(conn)
        })?;
        Ok(Self { runtime, conn })
    }

    /// Connect to `endpoint` with `config`.
    pub fn connect(endpoint: Endpoint, config: ClientConfig) -> Result<Self> {
        Self::open(endpoint, config, IdGenerator::global())
    }

    /// The wrapped connection.
    pub fn connection(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Run a future on this connection's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn session_id(&self) -> u32 {
        self.conn.session_id()
    }

    /// Send a raw request and wait for its answer.
    pub fn send_request(&mut self, code: u32, group: Option<&AvpGroup>) -> Result<Answer> {
        self.runtime.block_on(self.conn.send_request(code, group))
    }

    /// Run one event-loop iteration.
    pub fn process_events(&mut self) -> Result<ConnectionState> {
        self.runtime.block_on(self.conn.process_events())
    }

    /// Process events until nothing is outstanding.
    pub fn run(&mut self) -> Result<()> {
        self.runtime.block_on(self.conn.run())
    }

    pub fn close(&mut self) {
        self.conn.close();
    }

    blocking!(start_session(flags: u32, session_timeout: Option<Duration>, request_timeout: Option<Duration>) -> u32);
    blocking!(switch_session(flags: u32, session_timeout: Option<Duration>, request_timeout: Option<Duration>) -> u32);
    blocking!(end_session() -> ());
    blocking!(session_info() -> u32);
    blocking!(cfg_session_info() -> CfgSessionInfo);

    blocking!(get(params: &[(ValueType, &str)]) -> Vec<Value>);
    blocking!(set(params: &[(&str, Value)]) -> ());
    blocking!(list(path: &str, level: u16) -> Vec<Node>);
    blocking!(add_instance(path: &str, id: u16) -> u16);
    blocking!(del_instance(path: &str) -> ());
    blocking!(find_instance(path: &str, param: &str, value: &Value) -> u16);
    blocking!(commit() -> ());
    blocking!(cancel() -> ());
    blocking!(save() -> ());
    blocking!(dump(path: &str) -> String);
    blocking!(retrieve_enums(path: &str) -> Vec<String>);

    blocking_feedback!(subscribe_notify());
    blocking_feedback!(subscribe_gw_notify());
    blocking!(unsubscribe_notify() -> ());
    blocking!(unsubscribe_gw_notify() -> ());
    blocking!(param_notify(enabled: bool, paths: &[&str]) -> ());
    blocking!(recursive_param_notify(enabled: bool, path: &str) -> ());
    blocking!(get_passive_notifications() -> AvpCursor);

    blocking!(gw_get_client(zone: u16, nat: bool, addr: IpAddr, port: u16) -> AvpCursor);
    blocking!(gw_get_all_clients(zone: u16) -> AvpCursor);
    blocking!(gw_req_client_accessclass(request: &AccessClassRequest) -> AccessClassReply);
    blocking!(gw_set_client_accessclass(path: &str, username: Option<&str>, access_class: &str) -> ());
    blocking!(gw_sol_inform(zone: u16, access_class: u16, addr: IpAddr, mac: &str) -> ());

    blocking!(hotplug(cmd: &str) -> ());
    blocking!(conf_save(server: &str) -> ());
    blocking!(conf_restore(server: &str) -> ());
    blocking_feedback!(fwupdate(file: &str, device: &str, flags: u32));
    blocking_feedback!(ping(host: &str, count: u32, timeout: u32));
    blocking_feedback!(traceroute(host: &str, tries: u8, timeout: u32, size: u16, max_hop: u8));
    blocking_feedback!(pcap(interface: &str, url: &str, timeout: u32, packets: u16, kbytes: u16));
}

impl std::fmt::Debug for BlockingConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingConnection")
            .field("conn", &self.conn)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp::AvpWrite;
    use crate::codes::{self, avp, command};
    use crate::packet::{CommandFlags, HEADER_LEN, Packet, PacketBuilder};
    use std::io::{Read, Write};
    use std::os::unix::net::UnixListener;

    #[test]
    fn test_blocking_round_trip() {
        let path = std::env::temp_dir().join(format!("dmconfig-blocking-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut header = [0u8; HEADER_LEN];
            sock.read_exact(&mut header).unwrap();
            let len = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
            let mut raw = header.to_vec();
            raw.resize(len, 0);
            sock.read_exact(&mut raw[HEADER_LEN..]).unwrap();
            let req = Packet::decode(raw.into()).unwrap();
            assert_eq!(req.code(), command::DB_DUMP);

            let mut b = PacketBuilder::new(req.code(), CommandFlags::empty(), codes::APP_ID, req.hop_id(), req.hop_id()).unwrap();
            b.put_u32(avp::RC, 0).unwrap();
            b.begin_group(avp::CONTAINER).unwrap();
            b.put_str(avp::STRING, "Device.X=1").unwrap();
            b.end_group().unwrap();
            sock.write_all(&b.finish().unwrap()).unwrap();
        });

        let mut conn = BlockingConnection::connect(Endpoint::Unix(path.clone()), ClientConfig::default()).unwrap();
        assert_eq!(conn.dump("Device.").unwrap(), "Device.X=1");
        assert_eq!(conn.state(), ConnectionState::Idle);
        server.join().unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
