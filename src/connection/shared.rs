//! State shared by a connection handle and its two tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, watch};
use tokio::time::Instant;
use tracing::debug;

use crate::connection::ConnectionState;
use crate::error::Error;
use crate::message::CloseFrame;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Shared {
    state: watch::Sender<ConnectionState>,
    error: Mutex<Option<Error>>,
    peer_close: Mutex<Option<CloseFrame>>,
    last_pong: Mutex<Option<Instant>>,
    /// Send queue items enqueued but not yet written and flushed.
    unwritten: AtomicUsize,
    flushed: Notify,
}

impl Shared {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            state,
            error: Mutex::new(None),
            peer_close: Mutex::new(None),
            last_pong: Mutex::new(None),
            unwritten: AtomicUsize::new(0),
            flushed: Notify::new(),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Move to `next` if the lifecycle allows it. Returns whether this call
    /// performed the transition.
    pub(crate) fn transition(&self, next: ConnectionState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if changed {
            debug!(state = %next, "connection state changed");
            self.on_transition(next);
        }
        changed
    }

    /// Fail the connection. The first error wins; later ones are dropped.
    pub(crate) fn fail(&self, err: Error) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if current.can_transition_to(ConnectionState::Errored) {
                // Stored before the state is published so that anyone who
                // observes `Errored` also finds the error.
                *lock(&self.error) = Some(err);
                *current = ConnectionState::Errored;
                true
            } else {
                false
            }
        });
        if changed {
            self.on_transition(ConnectionState::Errored);
        }
        changed
    }

    /// Move to `Closed` from any state, `Errored` included. A stored error
    /// is kept and still reported by [`terminal_error`](Self::terminal_error).
    pub(crate) fn force_closed(&self) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == ConnectionState::Closed {
                false
            } else {
                *current = ConnectionState::Closed;
                true
            }
        });
        if changed {
            debug!(state = %ConnectionState::Closed, "connection state forced");
            self.on_transition(ConnectionState::Closed);
        }
        changed
    }

    fn on_transition(&self, next: ConnectionState) {
        if next.is_terminal() {
            self.flushed.notify_waiters();
        }
    }

    /// The error handed to waiters once the connection is terminal.
    pub(crate) fn terminal_error(&self) -> Error {
        if let Some(err) = lock(&self.error).clone() {
            return err;
        }
        Error::ConnectionClosed(self.peer_close())
    }

    /// Wait until the connection reaches a terminal state.
    pub(crate) async fn wait_terminal(&self) {
        let mut rx = self.subscribe();
        stopped(&mut rx).await;
    }

    pub(crate) fn set_peer_close(&self, frame: Option<CloseFrame>) {
        *lock(&self.peer_close) = frame;
    }

    pub(crate) fn peer_close(&self) -> Option<CloseFrame> {
        lock(&self.peer_close).clone()
    }

    pub(crate) fn record_pong(&self) {
        *lock(&self.last_pong) = Some(Instant::now());
    }

    pub(crate) fn last_pong(&self) -> Option<Instant> {
        *lock(&self.last_pong)
    }

    pub(crate) fn enqueued(&self) {
        self.unwritten.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn written(&self, count: usize) {
        if count == 0 {
            return;
        }
        if self.unwritten.fetch_sub(count, Ordering::AcqRel) == count {
            self.flushed.notify_waiters();
        }
    }

    pub(crate) fn unwritten(&self) -> usize {
        self.unwritten.load(Ordering::Acquire)
    }

    /// Wait until every enqueued item has been written, or fail with the
    /// terminal error if the connection ends first.
    pub(crate) async fn wait_flushed(&self) -> Result<(), Error> {
        loop {
            let notified = self.flushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.unwritten() == 0 {
                return Ok(());
            }
            if self.state().is_terminal() {
                return Err(self.terminal_error());
            }
            notified.await;
        }
    }
}

/// Resolve once the observed state is terminal.
pub(crate) async fn stopped(rx: &mut watch::Receiver<ConnectionState>) {
    // The sender lives in `Shared`, which outlives every receiver.
    let _ = rx.wait_for(ConnectionState::is_terminal).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CloseCode;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_transition_is_monotonic() {
        let shared = Shared::new();
        assert!(shared.transition(ConnectionState::Open));
        assert!(!shared.transition(ConnectionState::Open));
        assert!(shared.transition(ConnectionState::Closing));
        assert!(!shared.transition(ConnectionState::Open));
        assert!(shared.transition(ConnectionState::Closed));
        assert!(!shared.fail(Error::Timeout));
        assert_eq!(shared.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_first_error_wins() {
        let shared = Shared::new();
        shared.transition(ConnectionState::Open);
        assert!(shared.fail(Error::InvalidUtf8));
        assert!(!shared.fail(Error::Timeout));
        assert_eq!(shared.terminal_error(), Error::InvalidUtf8);
        assert!(!shared.transition(ConnectionState::Closed));
    }

    #[test]
    fn test_force_closed_from_errored_keeps_error() {
        let shared = Shared::new();
        shared.transition(ConnectionState::Open);
        shared.fail(Error::InvalidUtf8);

        assert!(shared.force_closed());
        assert_eq!(shared.state(), ConnectionState::Closed);
        assert_eq!(shared.terminal_error(), Error::InvalidUtf8);
        assert!(!shared.force_closed());
        assert!(!shared.fail(Error::Timeout));
    }

    #[test]
    fn test_terminal_error_carries_peer_close() {
        let shared = Shared::new();
        let frame = CloseFrame::new(CloseCode::GoingAway, "restart");
        shared.set_peer_close(Some(frame.clone()));
        assert_eq!(shared.terminal_error(), Error::ConnectionClosed(Some(frame)));
    }

    #[tokio::test]
    async fn test_wait_flushed_tracks_unwritten() {
        let shared = Arc::new(Shared::new());
        shared.transition(ConnectionState::Open);
        shared.enqueued();
        shared.enqueued();

        let waiter = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move { shared.wait_flushed().await }
        });

        shared.written(1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        shared.written(1);
        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_wait_flushed_fails_on_terminal() {
        let shared = Arc::new(Shared::new());
        shared.transition(ConnectionState::Open);
        shared.enqueued();

        let waiter = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move { shared.wait_flushed().await }
        });
        tokio::task::yield_now().await;

        shared.fail(Error::io(std::io::ErrorKind::BrokenPipe, "gone"));
        assert!(matches!(waiter.await.unwrap(), Err(Error::Io { .. })));
    }

    #[tokio::test]
    async fn test_wait_terminal() {
        let shared = Arc::new(Shared::new());
        shared.transition(ConnectionState::Open);
        let waiter = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move { shared.wait_terminal().await }
        });
        shared.transition(ConnectionState::Closed);
        waiter.await.unwrap();
    }
}
