//! Retry policy for transient failures on the read path.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;

type Predicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Decides whether a failed frame read is attempted again.
///
/// The policy only ever applies to the reader task. A retry resumes frame
/// consumption on the same transport; it never reconnects. Protocol
/// violations are never retried, whatever the predicate says, because they
/// do not originate from the transport.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
    retryable: Predicate,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
            retryable: Arc::new(Error::is_transient),
        }
    }

    /// Retry transient I/O errors (see [`Error::is_transient`]) up to
    /// `max_retries` consecutive times.
    #[must_use]
    pub fn transient(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::never()
        }
    }

    /// Replace the predicate deciding which errors are retryable.
    #[must_use]
    pub fn with_predicate<F>(mut self, retryable: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(retryable);
        self
    }

    /// Delay before each re-attempt.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Maximum number of consecutive re-attempts.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before each re-attempt.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Returns `true` if `error`, after `attempts` consecutive failed
    /// re-attempts, should be retried once more.
    #[must_use]
    pub fn should_retry(&self, error: &Error, attempts: u32) -> bool {
        if attempts >= self.max_retries {
            return false;
        }
        if error.close_code().is_some() || matches!(error, Error::ConnectionClosed(_)) {
            return false;
        }
        (self.retryable)(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::never()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
