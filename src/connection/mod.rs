//! Duplex connections with background reader and writer tasks.
//!
//! ## Data flow
//!
//! ```text
//!             send()/ping()/close()                       recv()/messages()
//!                     |                                          ^
//!                     v                                          |
//!   [ send queue (send_queue_size) ]          [ receive queue (recv_queue_size) ]
//!                     |                                          ^
//!                     v                                          |
//!   writer task <-- control lane (pongs, close replies) <-- reader task
//!                     |                                          ^
//!                     v                                          |
//!               FrameWrite half  <====  transport  ====>  FrameRead half
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsduplex::{CloseCode, Config, Connection, WebSocketCodec};
//!
//! let stream = handshake("wss://example.com/feed").await?;
//! let conn = Connection::open(WebSocketCodec::new(stream, Config::client()), Config::client())?;
//!
//! conn.send_str("subscribe").await?;
//! let reply = conn.recv_str().await?;
//! conn.close(CloseCode::Normal, "done").await?;
//! ```

mod fragmenter;
mod messages;
mod reader;
mod role;
mod shared;
mod state;
mod writer;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::{Connection, connect};
pub use fragmenter::MessageFragmenter;
pub use messages::Messages;
pub use role::Role;
pub use state::ConnectionState;
