//! The reader task: transport frames in, completed messages out.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::connection::ConnectionState;
use crate::connection::shared::{Shared, stopped};
use crate::error::{Error, Result};
use crate::message::{CloseFrame, Control, Message};
use crate::protocol::{Frame, MessageAssembler, OpCode};
use crate::transport::FrameRead;

pub(crate) struct Reader<R> {
    transport: R,
    shared: Arc<Shared>,
    recv_tx: mpsc::Sender<Message>,
    control_tx: mpsc::Sender<Control>,
    assembler: MessageAssembler,
    config: Config,
}

impl<R: FrameRead> Reader<R> {
    pub(crate) fn new(
        transport: R,
        shared: Arc<Shared>,
        recv_tx: mpsc::Sender<Message>,
        control_tx: mpsc::Sender<Control>,
        config: Config,
    ) -> Self {
        Self {
            transport,
            shared,
            recv_tx,
            control_tx,
            assembler: MessageAssembler::new(config.limits.clone()),
            config,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut state_rx = self.shared.subscribe();
        let outcome = tokio::select! {
            biased;
            outcome = self.read_loop() => outcome,
            () = stopped(&mut state_rx) => {
                debug!("reader stopped");
                return;
            }
        };

        match outcome {
            Ok(()) => {
                self.shared.transition(ConnectionState::Closed);
            }
            Err(err)
                if err.close_code().is_none()
                    && self.shared.state() == ConnectionState::Closing =>
            {
                debug!(error = %err, "transport ended during close handshake");
                self.shared.transition(ConnectionState::Closed);
            }
            Err(err) => {
                if let Some(code) = err.close_code() {
                    let close = Control::Close(Some(CloseFrame::new(code, "")));
                    if self.control_tx.try_send(close).is_err() {
                        warn!(code = code.as_u16(), "could not queue close frame");
                    }
                }
                error!(error = %err, "reader failed");
                self.shared.fail(err);
            }
        }
    }

    /// Returns `Ok(())` once the peer's Close frame has been handled.
    async fn read_loop(&mut self) -> Result<()> {
        let mut slice_start = Instant::now();
        loop {
            let frame = self.read_with_retry().await?;
            if self.handle(frame).await? {
                return Ok(());
            }

            if slice_start.elapsed() >= self.config.recv_time_slice {
                tokio::task::yield_now().await;
                slice_start = Instant::now();
            }
        }
    }

    async fn read_with_retry(&mut self) -> Result<Frame> {
        let policy = &self.config.retry_policy;
        let mut attempts = 0;
        loop {
            match self.transport.read_frame().await {
                Ok(frame) => return Ok(frame),
                Err(err) if policy.should_retry(&err, attempts) => {
                    attempts += 1;
                    warn!(attempt = attempts, max = policy.max_retries(), error = %err, "retrying frame read");
                    if !policy.backoff().is_zero() {
                        tokio::time::sleep(policy.backoff()).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Returns `true` when the frame ends the read side.
    async fn handle(&mut self, frame: Frame) -> Result<bool> {
        frame.validate()?;
        match frame.opcode {
            OpCode::Ping => {
                debug!(len = frame.payload().len(), "ping received");
                if self.config.auto_pong {
                    match self.control_tx.try_send(Control::Pong(frame.into_payload())) {
                        Ok(()) | Err(TrySendError::Closed(_)) => {}
                        Err(TrySendError::Full(_)) => warn!("control lane full, dropping pong"),
                    }
                }
            }
            OpCode::Pong => {
                debug!(len = frame.payload().len(), "pong received");
                self.shared.record_pong();
            }
            OpCode::Close => {
                self.on_close(&frame)?;
                return Ok(true);
            }
            _ => {
                if let Some(message) = self.assembler.push(frame)? {
                    self.deliver(message).await?;
                }
            }
        }
        Ok(false)
    }

    fn on_close(&mut self, frame: &Frame) -> Result<()> {
        let close = CloseFrame::parse(frame.payload())?;
        debug!(
            code = close.as_ref().map(|cf| cf.code.as_u16()),
            reason = close.as_ref().map(|cf| cf.reason.as_str()),
            "peer sent close"
        );
        self.shared.set_peer_close(close.clone());

        // Only the side that did not start the handshake echoes it.
        if self.shared.transition(ConnectionState::Closing) && self.config.autoclose {
            let echo = close.map(|cf| CloseFrame::new(cf.code, ""));
            if self.control_tx.try_send(Control::Close(echo)).is_err() {
                warn!("could not queue close echo");
            }
        }
        Ok(())
    }

    async fn deliver(&mut self, message: Message) -> Result<()> {
        if self.config.block_on_recv_queue_full {
            return self
                .recv_tx
                .send(message)
                .await
                .map_err(|_| Error::ConnectionClosed(None));
        }
        match self.recv_tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::RecvQueueFull {
                capacity: self.config.recv_queue_size,
            }),
            Err(TrySendError::Closed(_)) => Err(Error::ConnectionClosed(None)),
        }
    }
}
