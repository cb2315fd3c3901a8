//! Configuration and limits for duplex WebSocket connections.
//!
//! A [`Config`] is fixed when a connection is opened. Each connection owns
//! its own copy, so connections with different queue sizes or policies can
//! coexist in one process.

use std::time::Duration;

use crate::connection::Role;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Configuration limits for WebSocket connections.
///
/// These limits prevent resource exhaustion attacks and ensure
/// bounded memory usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single frame in bytes.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of a complete message in bytes.
    ///
    /// This applies to the total size after reassembling all fragments.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 1024
    pub max_fragment_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,   // 16 MB
            max_message_size: 64 * 1024 * 1024, // 64 MB
            max_fragment_count: 1024,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_frame_size: usize, max_message_size: usize, max_fragment_count: usize) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
        }
    }

    /// Create limits suitable for small embedded systems.
    ///
    /// - Max frame: 64 KB
    /// - Max message: 256 KB
    /// - Max fragments: 16
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_message_size: 256 * 1024,
            max_fragment_count: 16,
        }
    }

    /// Validate that message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<()> {
        if size > self.max_message_size {
            Err(Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that frame size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: usize) -> Result<()> {
        if size > self.max_frame_size {
            Err(Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`] if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<()> {
        if count > self.max_fragment_count {
            Err(Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }
}

/// Duplex connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits, including the reassembled message cap.
    pub limits: Limits,

    /// Role on the wire. Clients mask outgoing frames and expect unmasked
    /// frames from the peer; servers do the opposite.
    ///
    /// Default: Client
    pub role: Role,

    /// Capacity of the receive queue (completed messages).
    ///
    /// Default: 32
    pub recv_queue_size: usize,

    /// Capacity of the send queue (outbound items).
    ///
    /// Default: 16
    pub send_queue_size: usize,

    /// What the reader does when the receive queue is full.
    ///
    /// `true` suspends the reader, which stops reading frames until a
    /// consumer makes room. `false` fails the connection with
    /// [`Error::RecvQueueFull`] instead of dropping the message.
    ///
    /// Default: true
    pub block_on_recv_queue_full: bool,

    /// Batch contiguous ready data items into a single transport flush.
    ///
    /// Default: false
    pub coalesce_frames: bool,

    /// Maximum number of data items written per coalesced flush.
    ///
    /// Default: 32
    pub max_send_batch_size: usize,

    /// Deliver messages still buffered in the receive queue before
    /// surfacing a terminal error or close to consumers.
    ///
    /// Default: false
    pub drain_on_error: bool,

    /// Retry policy for transient read errors.
    ///
    /// Default: never retry
    pub retry_policy: RetryPolicy,

    /// Maximum uninterrupted work of the reader task before it yields.
    ///
    /// Default: 5 ms
    pub recv_time_slice: Duration,

    /// Maximum uninterrupted work of the writer task before it yields.
    ///
    /// Default: 5 ms
    pub send_time_slice: Duration,

    /// Payloads larger than this are split into continuation frames.
    ///
    /// Default: 64 KB (64 * 1024)
    pub fragment_size: usize,

    /// Answer pings with pongs automatically.
    ///
    /// Default: true
    pub auto_pong: bool,

    /// Reply to a peer's Close frame with a Close frame of our own.
    ///
    /// Default: true
    pub autoclose: bool,

    /// How long `close()` waits for the peer's Close acknowledgment.
    ///
    /// Default: 5 seconds
    pub close_timeout: Duration,

    /// How long `connect()` waits for the handshake to produce a transport.
    ///
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Accept unmasked frames from clients (server role only, testing aid).
    ///
    /// Default: false
    pub accept_unmasked_frames: bool,

    /// Read buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// Write buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub write_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            role: Role::Client,
            recv_queue_size: 32,
            send_queue_size: 16,
            block_on_recv_queue_full: true,
            coalesce_frames: false,
            max_send_batch_size: 32,
            drain_on_error: false,
            retry_policy: RetryPolicy::never(),
            recv_time_slice: Duration::from_millis(5),
            send_time_slice: Duration::from_millis(5),
            fragment_size: 64 * 1024,
            auto_pong: true,
            autoclose: true,
            close_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
            accept_unmasked_frames: false,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure for client role (mask all frames).
    #[must_use]
    pub fn client() -> Self {
        Self {
            role: Role::Client,
            ..Default::default()
        }
    }

    /// Configure for server role (no masking, reject unmasked client frames).
    #[must_use]
    pub fn server() -> Self {
        Self {
            role: Role::Server,
            ..Default::default()
        }
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the reassembled message cap.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.limits.max_message_size = size;
        self
    }

    /// Set the receive queue capacity.
    #[must_use]
    pub const fn with_recv_queue_size(mut self, size: usize) -> Self {
        self.recv_queue_size = size;
        self
    }

    /// Set the send queue capacity.
    #[must_use]
    pub const fn with_send_queue_size(mut self, size: usize) -> Self {
        self.send_queue_size = size;
        self
    }

    /// Choose between reader backpressure and failing on a full receive queue.
    #[must_use]
    pub const fn with_block_on_recv_queue_full(mut self, block: bool) -> Self {
        self.block_on_recv_queue_full = block;
        self
    }

    /// Enable or disable coalescing of ready data items.
    #[must_use]
    pub const fn with_coalesce_frames(mut self, coalesce: bool) -> Self {
        self.coalesce_frames = coalesce;
        self
    }

    /// Set the maximum number of items per coalesced flush.
    #[must_use]
    pub const fn with_max_send_batch_size(mut self, size: usize) -> Self {
        self.max_send_batch_size = size;
        self
    }

    /// Deliver buffered messages before surfacing terminal errors.
    #[must_use]
    pub const fn with_drain_on_error(mut self, drain: bool) -> Self {
        self.drain_on_error = drain;
        self
    }

    /// Set the read-path retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the reader and writer time slices.
    #[must_use]
    pub const fn with_time_slices(mut self, recv: Duration, send: Duration) -> Self {
        self.recv_time_slice = recv;
        self.send_time_slice = send;
        self
    }

    /// Set fragment size for outgoing messages.
    #[must_use]
    pub const fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size;
        self
    }

    /// Enable or disable automatic pong replies.
    #[must_use]
    pub const fn with_auto_pong(mut self, auto_pong: bool) -> Self {
        self.auto_pong = auto_pong;
        self
    }

    /// Enable or disable the Close echo sent in answer to a peer's Close.
    #[must_use]
    pub const fn with_autoclose(mut self, autoclose: bool) -> Self {
        self.autoclose = autoclose;
        self
    }

    /// Set how long `close()` waits for the peer.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set how long `connect()` waits for the handshake.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set write buffer size.
    #[must_use]
    pub const fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Check the values a connection cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for zero queue capacities, a zero
    /// batch size or a zero fragment size.
    pub fn validate(&self) -> Result<()> {
        if self.recv_queue_size == 0 {
            return Err(Error::InvalidConfig("recv_queue_size must be at least 1".into()));
        }
        if self.send_queue_size == 0 {
            return Err(Error::InvalidConfig("send_queue_size must be at least 1".into()));
        }
        if self.max_send_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "max_send_batch_size must be at least 1".into(),
            ));
        }
        if self.fragment_size == 0 {
            return Err(Error::InvalidConfig("fragment_size must be at least 1".into()));
        }
        Ok(())
    }
}
