//! Streaming error types.

use std::time::Duration;

use crate::classify::is_retryable_error;

/// Errors raised by the stream layer itself.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed: {reason}")]
    ConnectionClosed {
        /// Close reason.
        reason: String,
    },

    /// HTTP error.
    #[error("HTTP error: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Timeout.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Upstream failure carried as its message.
    #[error("{0}")]
    Upstream(String),
}

impl StreamError {
    /// Whether the failure is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        is_retryable_error(&self.to_string())
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Why a cancelable delay did not run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DelayCancelled {
    /// The token was already cancelled; no timer was started.
    #[error("Delay cancelled before it started")]
    AlreadyCancelled,
    /// The token was cancelled while waiting.
    #[error("Delay cancelled while waiting")]
    CancelledWhileWaiting,
}

/// Terminal outcome of the caller-side retry driver.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The failure is not retryable (or auto-reconnect is off).
    #[error("Non-retryable failure: {0}")]
    Terminal(E),

    /// Every retry failed.
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        /// Total attempts made, including the first one.
        attempts: u32,
        /// Last failure.
        last: E,
    },

    /// The retry loop was cancelled during a backoff wait.
    #[error("Retry cancelled after {attempts} attempts")]
    Cancelled {
        /// Attempts made before cancellation.
        attempts: u32,
        /// Failure that triggered the cancelled wait.
        last: E,
    },
}

impl<E> RetryError<E> {
    /// The underlying failure.
    pub const fn last_error(&self) -> &E {
        match self {
            Self::Terminal(e) | Self::Exhausted { last: e, .. } | Self::Cancelled { last: e, .. } => {
                e
            }
        }
    }

    /// Consume into the underlying failure.
    pub fn into_last_error(self) -> E {
        match self {
            Self::Terminal(e) | Self::Exhausted { last: e, .. } | Self::Cancelled { last: e, .. } => {
                e
            }
        }
    }
}
