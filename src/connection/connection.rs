use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::config::Config;
use crate::connection::messages::Messages;
use crate::connection::reader::Reader;
use crate::connection::shared::Shared;
use crate::connection::writer::Writer;
use crate::connection::ConnectionState;
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Control, Message, SendItem};
use crate::protocol::MAX_CONTROL_FRAME_PAYLOAD;
use crate::transport::FrameTransport;

/// Capacity of the priority lane used for pongs and close replies.
const CONTROL_LANE_SIZE: usize = 8;

struct Tasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Establish a connection: run `handshake` under the configured connect
/// timeout, then open the transport it produces.
///
/// # Errors
///
/// - `Error::InvalidConfig` if `config` is rejected by [`Config::validate`]
/// - `Error::Connect` if the handshake fails or does not finish in time
pub async fn connect<F, T, E>(handshake: F, config: Config) -> Result<Connection>
where
    F: Future<Output = std::result::Result<T, E>>,
    T: FrameTransport,
    E: fmt::Display,
{
    config.validate()?;
    let transport = match timeout(config.connect_timeout, handshake).await {
        Ok(Ok(transport)) => transport,
        Ok(Err(err)) => return Err(Error::Connect(err.to_string())),
        Err(_) => {
            return Err(Error::Connect(format!(
                "handshake did not complete within {:?}",
                config.connect_timeout
            )));
        }
    };
    Connection::open(transport, config)
}

/// A decoupled duplex WebSocket connection.
///
/// Two background tasks own the transport: the reader turns frames into
/// messages and pushes them onto the receive queue, the writer drains the
/// send queue onto the wire. Every method here only touches those queues
/// and the shared lifecycle state, so all of them take `&self` and a
/// `Connection` can be shared between tasks behind an `Arc`.
///
/// Dropping a connection aborts both tasks without a close handshake; call
/// [`close`](Self::close) first for a graceful shutdown.
pub struct Connection {
    shared: Arc<Shared>,
    send_tx: mpsc::Sender<SendItem>,
    recv_rx: AsyncMutex<mpsc::Receiver<Message>>,
    tasks: Mutex<Option<Tasks>>,
    config: Config,
}

impl Connection {
    /// Start the reader and writer tasks on an already upgraded transport.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidConfig` if `config` is rejected by [`Config::validate`]
    /// - `Error::Connect` outside a tokio runtime
    pub fn open<T: FrameTransport>(transport: T, config: Config) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| Error::Connect(err.to_string()))?;

        let shared = Arc::new(Shared::new());
        let (send_tx, send_rx) = mpsc::channel(config.send_queue_size);
        let (recv_tx, recv_rx) = mpsc::channel(config.recv_queue_size);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_LANE_SIZE);

        let (read_half, write_half) = transport.split();
        shared.transition(ConnectionState::Open);

        let reader = Reader::new(
            read_half,
            Arc::clone(&shared),
            recv_tx,
            control_tx,
            config.clone(),
        );
        let writer = Writer::new(
            write_half,
            Arc::clone(&shared),
            send_rx,
            control_rx,
            config.clone(),
        );
        let tasks = Tasks {
            reader: runtime.spawn(reader.run()),
            writer: runtime.spawn(writer.run()),
        };
        debug!(role = %config.role, "connection open");

        Ok(Self {
            shared,
            send_tx,
            recv_rx: AsyncMutex::new(recv_rx),
            tasks: Mutex::new(Some(tasks)),
            config,
        })
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Returns `true` once the connection is terminal (closed or errored).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().is_terminal()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Status code from the peer's Close frame, if one was received.
    #[must_use]
    pub fn close_code(&self) -> Option<CloseCode> {
        self.shared.peer_close().map(|cf| cf.code)
    }

    /// Reason from the peer's Close frame, if one was received.
    #[must_use]
    pub fn close_reason(&self) -> Option<String> {
        self.shared.peer_close().map(|cf| cf.reason)
    }

    /// When the last Pong arrived.
    #[must_use]
    pub fn last_pong(&self) -> Option<Instant> {
        self.shared.last_pong()
    }

    /// Number of send queue items not yet written to the transport.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.shared.unwritten()
    }

    // ---------------------------------------------------------------------
    // Sending
    // ---------------------------------------------------------------------

    /// Wait for a send queue slot. Gives up with the terminal error as soon
    /// as the connection ends, so a full queue never outlives it.
    async fn reserve(&self) -> Result<mpsc::Permit<'_, SendItem>> {
        tokio::select! {
            biased;
            () = self.shared.wait_terminal() => Err(self.shared.terminal_error()),
            permit = self.send_tx.reserve() => permit.map_err(|_| self.shared.terminal_error()),
        }
    }

    async fn enqueue(&self, item: SendItem) -> Result<()> {
        if !self.state().can_send() {
            return Err(self.shared.terminal_error());
        }
        let permit = self.reserve().await?;
        // Counted only once a slot is held, so a cancelled send leaves
        // nothing behind for `flush` to wait on.
        self.shared.enqueued();
        permit.send(item);
        Ok(())
    }

    /// Enqueue a message for sending.
    ///
    /// Suspends only while the send queue is full and returns as soon as
    /// the message is enqueued; use [`flush`](Self::flush) to wait until it
    /// has been written.
    ///
    /// # Errors
    ///
    /// Returns the terminal error (or `Error::ConnectionClosed`) if the
    /// connection is no longer open.
    pub async fn send(&self, message: impl Into<Message>) -> Result<()> {
        self.enqueue(SendItem::Data(message.into())).await
    }

    /// Enqueue a text message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_str(&self, text: &str) -> Result<()> {
        self.send(Message::text(text)).await
    }

    /// Enqueue a binary message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_bytes(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Message::binary(data)).await
    }

    /// Serialize `value` as JSON and enqueue it as a text message.
    ///
    /// # Errors
    ///
    /// `Error::Json` if serialization fails, otherwise see [`send`](Self::send).
    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.send(Message::Text(text)).await
    }

    /// Enqueue a Ping. It is written in order with the data around it.
    ///
    /// # Errors
    ///
    /// `Error::ControlFrameTooLarge` for payloads over 125 bytes, otherwise
    /// see [`send`](Self::send).
    pub async fn ping(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        let payload = payload.into();
        if payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(payload.len()));
        }
        self.enqueue(SendItem::Control(Control::Ping(payload))).await
    }

    /// Wait until every item enqueued so far has been written and flushed.
    ///
    /// # Errors
    ///
    /// Returns the terminal error if the connection ends with items still
    /// unwritten.
    pub async fn flush(&self) -> Result<()> {
        self.shared.wait_flushed().await
    }

    /// [`flush`](Self::flush) with a deadline.
    ///
    /// # Errors
    ///
    /// `Error::Timeout` if the deadline elapses first. The connection is
    /// not affected.
    pub async fn flush_timeout(&self, limit: Duration) -> Result<()> {
        timeout(limit, self.flush())
            .await
            .map_err(|_| Error::Timeout)?
    }

    // ---------------------------------------------------------------------
    // Receiving
    // ---------------------------------------------------------------------

    /// Take the oldest received message.
    ///
    /// Concurrent callers are served in the order they called. Once the
    /// connection is terminal, buffered messages are still returned when
    /// `drain_on_error` is set; otherwise the terminal error is returned
    /// straight away.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` after a close, with the peer's close frame
    /// - the error that failed the connection, once it is errored
    pub async fn recv(&self) -> Result<Message> {
        let mut rx = self.recv_rx.lock().await;
        let drain = self.config.drain_on_error;
        if !drain && self.is_closed() {
            return Err(self.shared.terminal_error());
        }

        tokio::select! {
            biased;
            message = rx.recv() => message.ok_or_else(|| self.shared.terminal_error()),
            () = self.shared.wait_terminal(), if !drain => Err(self.shared.terminal_error()),
        }
    }

    /// [`recv`](Self::recv) with a deadline.
    ///
    /// # Errors
    ///
    /// `Error::Timeout` if nothing arrived in time; no message is consumed.
    pub async fn recv_timeout(&self, limit: Duration) -> Result<Message> {
        timeout(limit, self.recv())
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Receive a text message.
    ///
    /// # Errors
    ///
    /// `Error::NotText` if the next message is binary; it is consumed.
    pub async fn recv_str(&self) -> Result<String> {
        self.recv().await?.into_text().ok_or(Error::NotText)
    }

    /// Receive a text message and decode it as JSON.
    ///
    /// # Errors
    ///
    /// - `Error::NotText` if the next message is binary; it is consumed
    /// - `Error::Json` if the payload does not decode into `T`
    pub async fn recv_json<T: DeserializeOwned>(&self) -> Result<T> {
        let text = self.recv_str().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// A stream of received messages.
    ///
    /// The stream ends after a clean close and yields the error once if the
    /// connection failed.
    #[must_use]
    pub fn messages(&self) -> Messages<'_> {
        Messages::new(self)
    }

    // ---------------------------------------------------------------------
    // Shutdown
    // ---------------------------------------------------------------------

    /// Close gracefully.
    ///
    /// Enqueues a Close frame behind everything already queued, waits up to
    /// `close_timeout` for the peer's Close or for the connection to end,
    /// then stops both tasks and leaves the connection `Closed`. Calling it
    /// again, or after the connection ended, only performs the cleanup.
    ///
    /// # Errors
    ///
    /// Only for invalid arguments: `Error::InvalidCloseCode` for a code that
    /// must not be sent, `Error::ControlFrameTooLarge` for a reason longer
    /// than 123 bytes. Failures during the handshake itself are logged.
    pub async fn close(&self, code: CloseCode, reason: &str) -> Result<()> {
        if !code.is_valid() {
            return Err(Error::InvalidCloseCode(code.as_u16()));
        }
        if reason.len() + 2 > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(reason.len() + 2));
        }

        let initiated = self.shared.transition(ConnectionState::Closing);
        let handshake = async {
            if initiated {
                debug!(code = code.as_u16(), reason, "closing");
                let close = Control::Close(Some(CloseFrame::new(code, reason)));
                if let Ok(permit) = self.reserve().await {
                    self.shared.enqueued();
                    permit.send(SendItem::Control(close));
                }
            }
            self.shared.wait_terminal().await;
        };
        if timeout(self.config.close_timeout, handshake).await.is_err() {
            warn!(timeout = ?self.config.close_timeout, "close handshake did not complete");
        }

        self.shared.force_closed();
        self.teardown();
        Ok(())
    }

    /// Stop immediately: no close handshake, both tasks are aborted and the
    /// transport released. Safe to call from any context, any number of
    /// times, and while [`close`](Self::close) is waiting.
    ///
    /// The connection ends `Closed` whatever its state, `Errored` included;
    /// the error that failed it is still returned by `recv` and `send`.
    pub fn terminate(&self) {
        if self.shared.force_closed() {
            debug!("connection terminated");
        }
        self.teardown();
    }

    fn teardown(&self) {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tasks) = tasks {
            tasks.reader.abort();
            tasks.writer.abort();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("role", &self.config.role)
            .field("pending_writes", &self.pending_writes())
            .finish_non_exhaustive()
    }
}
