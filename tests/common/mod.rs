//! Shared test infrastructure for async-dmconfig.
//!
//! Provides an in-process fake server on the far end of a socket pair.

#![allow(dead_code)]

use std::sync::Arc;

use async_dmconfig::avp::{AvpGroup, AvpWrite};
use async_dmconfig::codes::{self, avp};
use async_dmconfig::packet::{CommandFlags, HEADER_LEN};
use async_dmconfig::{ClientConfig, Connection, IdGenerator, Packet, PacketBuilder, Stream};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

/// Server side of a connection under test.
pub struct FakeServer<S = UnixStream> {
    sock: S,
}

/// A connected client and the fake server at the other end.
pub fn pair() -> (Connection, FakeServer) {
    pair_with(ClientConfig::default())
}

pub fn pair_with(config: ClientConfig) -> (Connection, FakeServer) {
    let (client, server) = UnixStream::pair().expect("socket pair");
    let conn = Connection::from_socket_with_ids(
        Stream::from(client),
        config,
        Arc::new(IdGenerator::starting_at(1000)),
    );
    (conn, FakeServer { sock: server })
}

impl<S: AsyncRead + AsyncWrite + Unpin> FakeServer<S> {
    pub fn new(sock: S) -> Self {
        Self { sock }
    }

    /// Read one complete packet.
    pub async fn read_packet(&mut self) -> Packet {
        let mut header = [0u8; HEADER_LEN];
        self.sock.read_exact(&mut header).await.expect("read header");
        let len = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
        let mut raw = header.to_vec();
        raw.resize(len, 0);
        self.sock
            .read_exact(&mut raw[HEADER_LEN..])
            .await
            .expect("read body");
        Packet::decode(raw.into()).expect("valid packet")
    }

    pub async fn send_raw(&mut self, data: &[u8]) {
        self.sock.write_all(data).await.expect("write");
    }

    /// Answer `request` with result code `rc` and an optional body container.
    pub async fn answer(&mut self, request: &Packet, rc: u32, body: Option<&AvpGroup>) {
        let data = answer_bytes(request.code(), request.hop_id(), rc, body);
        self.send_raw(&data).await;
    }

    /// Push a server-initiated packet.
    pub async fn push(&mut self, code: u32, body: &AvpGroup) {
        let data = push_bytes(code, body);
        self.send_raw(&data).await;
    }

    pub fn into_inner(self) -> S {
        self.sock
    }
}

pub fn answer_bytes(code: u32, hop_id: u32, rc: u32, body: Option<&AvpGroup>) -> Vec<u8> {
    let mut b = PacketBuilder::new(code, CommandFlags::empty(), codes::APP_ID, hop_id, hop_id)
        .expect("builder");
    b.put_u32(avp::RC, rc).expect("rc");
    if let Some(body) = body {
        b.put_group(avp::CONTAINER, body).expect("body");
    }
    b.finish().expect("finish").to_vec()
}

pub fn push_bytes(code: u32, body: &AvpGroup) -> Vec<u8> {
    let mut b = PacketBuilder::new(code, CommandFlags::REQUEST, codes::APP_ID, 0, 0)
        .expect("builder");
    let mut cursor = body.cursor();
    while let Some(attr) = cursor.next_avp().expect("valid group") {
        b.put_avp(
            async_dmconfig::AvpHeader::from_parts(attr.code, attr.flags, attr.vendor_id),
            &attr.data,
        )
        .expect("attr");
    }
    b.finish().expect("finish").to_vec()
}

/// A group holding one string.
pub fn string_body(code: u32, text: &str) -> AvpGroup {
    let mut g = AvpGroup::new();
    g.put_str(code, text).expect("string");
    g
}
