//! The frame transport seam.
//!
//! A connection never touches sockets directly. It is handed an already
//! upgraded transport that can read and write whole frames, splits it in two,
//! and gives the read half to the reader task and the write half to the
//! writer task. [`WebSocketCodec`](crate::codec::WebSocketCodec) implements
//! these traits for any tokio byte stream; tests plug in scripted transports.

use std::future::Future;

use crate::error::Result;
use crate::protocol::Frame;

/// The read half of a frame transport.
pub trait FrameRead: Send + 'static {
    /// Read the next frame.
    ///
    /// Implementations must be cancel-safe: a partially received frame stays
    /// buffered so that a later call (for instance after a retried error)
    /// resumes where the previous one stopped.
    fn read_frame(&mut self) -> impl Future<Output = Result<Frame>> + Send;
}

/// The write half of a frame transport.
pub trait FrameWrite: Send + 'static {
    /// Queue one frame for writing.
    ///
    /// The frame may sit in a buffer until [`flush`](Self::flush) is called.
    fn write_frame(&mut self, frame: &Frame) -> impl Future<Output = Result<()>> + Send;

    /// Push every queued frame to the peer.
    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Flush, then close the write direction.
    fn shutdown(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// An open, frame-oriented duplex connection.
pub trait FrameTransport: Send + 'static {
    type Reader: FrameRead;
    type Writer: FrameWrite;

    /// Separate the transport into independently owned halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}
