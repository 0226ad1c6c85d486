//! Connection states and resilience notifications.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Liveness state of one active stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Stream opened, no event observed yet.
    Connecting,
    /// At least one event observed since the last (re)connect.
    Connected,
    /// Caller is re-establishing the stream.
    Reconnecting,
    /// Stream ended or was stopped.
    Disconnected,
    /// Stream failed.
    Failed,
}

impl ConnectionState {
    /// Terminal for the current monitor lifecycle; only `start()` leaves it.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Notification emitted by the connection monitor and the retry driver.
#[derive(Debug, Clone, PartialEq)]
pub enum ResilienceEvent {
    /// The monitor changed state.
    StateChange {
        /// New state.
        state: ConnectionState,
        /// Human-readable reason (set for failures).
        reason: Option<String>,
    },
    /// No event observed for longer than the heartbeat timeout.
    HeartbeatTimeout {
        /// When the last event was observed.
        last_event_at: Instant,
        /// How long the stream has been silent.
        silent_for: Duration,
    },
    /// A retry is about to be attempted after `delay_ms`.
    RetryAttempt {
        /// One-based retry number.
        attempt: u32,
        /// Retry budget.
        max_retries: u32,
        /// Backoff delay before the retry (milliseconds).
        delay_ms: u64,
    },
    /// A retry succeeded.
    ReconnectSuccess {
        /// One-based retry number that succeeded.
        attempt: u32,
    },
    /// Retries were exhausted or the failure was terminal after retrying.
    ReconnectFailed {
        /// Last failure message.
        error: String,
    },
}

impl ResilienceEvent {
    /// Short machine-friendly name, used as a log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StateChange { .. } => "state_change",
            Self::HeartbeatTimeout { .. } => "heartbeat_timeout",
            Self::RetryAttempt { .. } => "retry_attempt",
            Self::ReconnectSuccess { .. } => "reconnect_success",
            Self::ReconnectFailed { .. } => "reconnect_failed",
        }
    }
}

/// Callback receiving resilience notifications.
pub type ResilienceCallback = Arc<dyn Fn(&ResilienceEvent) + Send + Sync>;
