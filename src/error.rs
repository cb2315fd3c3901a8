//! Error types for the duplex WebSocket client.
//!
//! Every failure a connection can surface is a variant of [`Error`]. The type
//! is `Clone` so that a single terminal error can be handed to every pending
//! and future waiter on a connection's queues.

use std::io::ErrorKind;

use thiserror::Error;

use crate::message::{CloseCode, CloseFrame};

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid frame structure or header.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reassembled message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Cumulative size reached when the limit was crossed.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Payload length announced on the wire does not fit in `usize`.
    #[error("Payload too large for platform: {size} bytes (max: {max})")]
    PayloadTooLargeForPlatform {
        /// Announced payload length.
        size: u64,
        /// Largest representable length.
        max: u64,
    },

    /// Connection has been closed. Carries the peer's close frame, if any.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<CloseFrame>),

    /// The handshake failed or did not complete before the connect timeout.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Configuration rejected at connect time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error on the underlying transport.
    #[error("I/O error: {message}")]
    Io {
        /// Kind of the original `std::io::Error`.
        kind: ErrorKind,
        /// Rendered error message.
        message: String,
    },

    /// A local deadline on `recv`, `flush` or `close` elapsed.
    #[error("Operation timed out")]
    Timeout,

    /// The receive queue was full and the connection is configured to fail
    /// instead of applying backpressure.
    #[error("Receive queue full (capacity: {capacity})")]
    RecvQueueFull {
        /// Configured receive queue capacity.
        capacity: usize,
    },

    /// A text message was expected but a binary one arrived.
    #[error("Received non-text message")]
    NotText,

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid close code.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),
}

impl Error {
    /// Build an I/O error from a kind and message.
    #[must_use]
    pub fn io(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Io {
            kind,
            message: message.into(),
        }
    }

    /// Returns `true` for transport failures that may succeed when the read
    /// is attempted again.
    ///
    /// This is the default retry predicate: interrupted, would-block and
    /// timed-out reads are transient, everything else is not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Io {
                kind: ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut,
                ..
            }
        )
    }

    /// Returns `true` if this error is a local, recoverable deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Close code sent to the peer when this error fails a connection.
    ///
    /// Transport failures return `None`: the link is gone, nothing is sent.
    #[must_use]
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::MessageTooLarge { .. }
            | Error::FrameTooLarge { .. }
            | Error::TooManyFragments { .. }
            | Error::PayloadTooLargeForPlatform { .. } => Some(CloseCode::MessageTooBig),
            Error::InvalidUtf8 => Some(CloseCode::InvalidPayload),
            Error::RecvQueueFull { .. } => Some(CloseCode::InternalError),
            Error::InvalidFrame(_)
            | Error::ProtocolViolation(_)
            | Error::InvalidCloseCode(_)
            | Error::ReservedOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::UnmaskedClientFrame
            | Error::MaskedServerFrame
            | Error::ReservedBitsSet
            | Error::InvalidOpcode(_) => Some(CloseCode::ProtocolError),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}
