//! Shared fixtures for integration tests.
//!
//! - [`Peer`]: the server end of an in-memory duplex stream, speaking real
//!   RFC 6455 frames through the codec.
//! - [`scripted`]: a frame transport driven by the test, with injectable read
//!   errors, a stallable writer and a log of everything written.

#![allow(dead_code)]

pub mod scripted;

use std::time::Duration;

use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use wsduplex::codec::{CodecReader, CodecWriter};
use wsduplex::protocol::{Frame, OpCode};
use wsduplex::{Config, Connection, ConnectionState, FrameRead, FrameTransport, FrameWrite, WebSocketCodec};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// The server end of a duplex stream.
pub struct Peer {
    pub reader: CodecReader<ReadHalf<DuplexStream>>,
    pub writer: CodecWriter<WriteHalf<DuplexStream>>,
}

impl Peer {
    pub async fn read(&mut self) -> Frame {
        tokio::time::timeout(WAIT, self.reader.read_frame())
            .await
            .expect("peer timed out waiting for a frame")
            .expect("peer failed to read a frame")
    }

    /// Read frames until one that is not a Pong arrives.
    pub async fn read_skipping_pongs(&mut self) -> Frame {
        loop {
            let frame = self.read().await;
            if frame.opcode != OpCode::Pong {
                return frame;
            }
        }
    }

    pub async fn send(&mut self, frame: Frame) {
        self.writer.write_frame(&frame).await.unwrap();
        self.writer.flush().await.unwrap();
    }
}

/// A client connection wired to a [`Peer`] over an in-memory stream.
pub fn client_and_peer(config: Config) -> (Connection, Peer) {
    let (client_io, server_io) = tokio::io::duplex(256 * 1024);
    let conn = Connection::open(WebSocketCodec::new(client_io, config.clone()), config)
        .expect("open client connection");
    let (reader, writer) = WebSocketCodec::new(server_io, Config::server()).split();
    (conn, Peer { reader, writer })
}

/// A client connection wired to a peer that echoes every data frame back
/// unchanged (fragmentation included), answers pings and returns the close
/// handshake.
pub fn echo_client(config: Config) -> (Connection, JoinHandle<()>) {
    let (conn, mut peer) = client_and_peer(config);
    let echo = tokio::spawn(async move {
        loop {
            let Ok(frame) = peer.reader.read_frame().await else {
                return;
            };
            match frame.opcode {
                OpCode::Ping => peer.send(Frame::pong(frame.into_payload())).await,
                OpCode::Pong => {}
                OpCode::Close => {
                    peer.send(Frame::new(true, OpCode::Close, frame.into_payload()))
                        .await;
                    let _ = peer.writer.shutdown().await;
                    return;
                }
                _ => peer.send(frame).await,
            }
        }
    });
    (conn, echo)
}

/// Poll until the connection reaches `state`.
pub async fn wait_for_state(conn: &Connection, state: ConnectionState) {
    tokio::time::timeout(WAIT, async {
        while conn.state() != state {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("connection stuck in {} waiting for {state}", conn.state()));
}
