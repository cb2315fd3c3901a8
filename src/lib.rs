//! # wsduplex - decoupled asynchronous WebSocket connections
//!
//! `wsduplex` runs a WebSocket connection as two independent tokio tasks
//! joined to the application by bounded queues:
//!
//! - a **reader** that reassembles frames into messages, answers pings and
//!   pushes completed messages onto the receive queue,
//! - a **writer** that drains the send queue, fragments large payloads and
//!   optionally coalesces ready messages into a single flush.
//!
//! Full queues apply backpressure instead of growing without bound. Read
//! errors can be retried through a [`RetryPolicy`], and both tasks yield to
//! the scheduler after a configurable time slice.
//!
//! The opening handshake is not part of this crate. Hand an upgraded stream
//! to [`WebSocketCodec`], or implement [`FrameTransport`] for your own
//! framed connection.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsduplex::{connect, CloseCode, Config, WebSocketCodec};
//!
//! let config = Config::client().with_coalesce_frames(true);
//! let conn = connect(
//!     async { upgrade(url).await.map(|io| WebSocketCodec::new(io, Config::client())) },
//!     config,
//! )
//! .await?;
//!
//! conn.send_json(&request).await?;
//! let reply: Reply = conn.recv_json().await?;
//! conn.close(CloseCode::Normal, "").await?;
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod retry;
pub mod transport;

pub use codec::WebSocketCodec;
pub use config::{Config, Limits};
pub use connection::{Connection, ConnectionState, Messages, Role, connect};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::OpCode;
pub use retry::RetryPolicy;
pub use transport::{FrameRead, FrameTransport, FrameWrite};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<RetryPolicy>();
        assert_send::<Message>();
        assert_send::<CloseFrame>();
        assert_send::<ConnectionState>();
        assert_send::<Connection>();
        assert_send::<Messages<'static>>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<RetryPolicy>();
        assert_sync::<Message>();
        assert_sync::<Connection>();
        assert_sync::<Role>();
    }
}
