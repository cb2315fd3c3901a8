//! RFC 6455 framing over tokio byte streams.
//!
//! [`WebSocketCodec`] wraps an upgraded stream and implements
//! [`FrameTransport`](crate::transport::FrameTransport); splitting it yields a
//! [`CodecReader`] and a [`CodecWriter`].

mod framed;

pub use framed::{CodecReader, CodecWriter, WebSocketCodec};
