//! The writer task: send queue items in, frames out.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, trace};

use crate::config::Config;
use crate::connection::ConnectionState;
use crate::connection::fragmenter::MessageFragmenter;
use crate::connection::shared::{Shared, stopped};
use crate::error::Result;
use crate::message::{Control, Message, SendItem};
use crate::protocol::Frame;
use crate::transport::FrameWrite;

enum Next {
    /// Auto-reply or error close from the reader's priority lane.
    Lane(Control),
    Queued(SendItem),
}

enum Exit {
    CloseSent,
    Stopped,
    /// Stopped in the middle of a transport write.
    Interrupted,
}

pub(crate) struct Writer<W> {
    transport: W,
    shared: Arc<Shared>,
    send_rx: mpsc::Receiver<SendItem>,
    control_rx: mpsc::Receiver<Control>,
    config: Config,
}

impl<W: FrameWrite> Writer<W> {
    pub(crate) fn new(
        transport: W,
        shared: Arc<Shared>,
        send_rx: mpsc::Receiver<SendItem>,
        control_rx: mpsc::Receiver<Control>,
        config: Config,
    ) -> Self {
        Self {
            transport,
            shared,
            send_rx,
            control_rx,
            config,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut state_rx = self.shared.subscribe();
        let mut stop_rx = self.shared.subscribe();
        // A transport that never completes a write must not keep the task
        // alive once the connection has ended.
        let outcome = tokio::select! {
            biased;
            outcome = self.write_loop(&mut state_rx) => outcome,
            () = stopped(&mut stop_rx) => Ok(Exit::Interrupted),
        };

        match outcome {
            Ok(Exit::CloseSent) => debug!("writer finished after close frame"),
            Ok(Exit::Stopped) => {
                debug!("writer stopped");
                self.send_pending_close().await;
            }
            // A partial frame may be buffered, so nothing more is written.
            Ok(Exit::Interrupted) => debug!("writer interrupted"),
            Err(err) => {
                error!(error = %err, "writer failed");
                self.shared.fail(err);
            }
        }
    }

    async fn write_loop(&mut self, state_rx: &mut watch::Receiver<ConnectionState>) -> Result<Exit> {
        let mut slice_start = Instant::now();
        loop {
            let next = tokio::select! {
                biased;
                Some(control) = self.control_rx.recv() => Next::Lane(control),
                item = self.send_rx.recv() => match item {
                    Some(item) => Next::Queued(item),
                    None => return Ok(Exit::Stopped),
                },
                () = stopped(state_rx) => return Ok(Exit::Stopped),
            };

            let close_sent = match next {
                Next::Lane(control) => self.write_control(control).await?,
                Next::Queued(SendItem::Control(control)) => {
                    let close_sent = self.write_control(control).await?;
                    self.shared.written(1);
                    close_sent
                }
                Next::Queued(SendItem::Data(message)) => self.write_data(message).await?,
            };

            if close_sent {
                if let Err(err) = self.transport.shutdown().await {
                    debug!(error = %err, "shutdown after close frame failed");
                }
                return Ok(Exit::CloseSent);
            }

            if slice_start.elapsed() >= self.config.send_time_slice {
                tokio::task::yield_now().await;
                slice_start = Instant::now();
            }
        }
    }

    /// Write one control frame and flush it. Returns `true` for Close.
    async fn write_control(&mut self, control: Control) -> Result<bool> {
        let is_close = control.is_close();
        let frame = Frame::from(control);
        debug!(opcode = %frame.opcode, len = frame.payload().len(), "writing control frame");
        self.transport.write_frame(&frame).await?;
        self.transport.flush().await?;
        Ok(is_close)
    }

    async fn encode_message(&mut self, message: Message) -> Result<()> {
        for frame in MessageFragmenter::new(message, self.config.fragment_size) {
            self.transport.write_frame(&frame).await?;
        }
        Ok(())
    }

    /// Write a data item, plus any contiguous ready data items when
    /// coalescing, then flush once. A control item met while batching is
    /// written right after the batch so queue order is kept.
    ///
    /// Returns `true` if that control item was a Close.
    async fn write_data(&mut self, first: Message) -> Result<bool> {
        self.encode_message(first).await?;
        let mut batch = 1;
        let mut deferred = None;

        if self.config.coalesce_frames {
            while batch < self.config.max_send_batch_size {
                match self.send_rx.try_recv() {
                    Ok(SendItem::Data(message)) => {
                        self.encode_message(message).await?;
                        batch += 1;
                    }
                    Ok(SendItem::Control(control)) => {
                        deferred = Some(control);
                        break;
                    }
                    Err(_) => break,
                }
            }
        }

        self.transport.flush().await?;
        self.shared.written(batch);
        trace!(batch, "data flushed");

        match deferred {
            Some(control) => {
                let close_sent = self.write_control(control).await?;
                self.shared.written(1);
                Ok(close_sent)
            }
            None => Ok(false),
        }
    }

    /// Best effort: a Close queued by the reader just before the connection
    /// turned terminal still reaches the peer.
    ///
    /// Bounded by `close_timeout` so a stalled transport is still released.
    async fn send_pending_close(&mut self) {
        while let Ok(control) = self.control_rx.try_recv() {
            if control.is_close() {
                let limit = self.config.close_timeout;
                match tokio::time::timeout(limit, self.write_control(control)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => debug!(error = %err, "could not send pending close frame"),
                    Err(_) => debug!(timeout = ?limit, "pending close frame timed out"),
                }
                return;
            }
        }
    }
}
