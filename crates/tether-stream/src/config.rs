//! Resilience configuration for a streamed session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum retry attempts after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial backoff delay (milliseconds).
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;

/// Default maximum backoff delay (milliseconds).
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

/// Default heartbeat timeout (milliseconds).
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 90_000;

/// Default overall request timeout (milliseconds).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;

/// Default interval of the periodic liveness check (milliseconds).
pub const DEFAULT_HEARTBEAT_CHECK_INTERVAL_MS: u64 = 5_000;

/// Immutable per-session resilience settings.
///
/// The request timeout is informational: nothing in this crate enforces it,
/// callers wrap their own requests with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Maximum retry attempts after the initial attempt.
    pub max_retries: u32,

    /// Backoff delay for attempt zero (milliseconds).
    pub initial_backoff_ms: u64,

    /// Upper bound for any backoff delay (milliseconds).
    pub max_backoff_ms: u64,

    /// Silence longer than this raises a heartbeat timeout (milliseconds).
    pub heartbeat_timeout_ms: u64,

    /// Overall request timeout (milliseconds).
    pub request_timeout_ms: u64,

    /// Whether callers should reconnect after retryable failures.
    pub auto_reconnect: bool,

    /// Tick of the periodic liveness check (milliseconds).
    ///
    /// Independent of `heartbeat_timeout_ms`.
    pub heartbeat_check_interval_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            heartbeat_timeout_ms: DEFAULT_HEARTBEAT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            auto_reconnect: true,
            heartbeat_check_interval_ms: DEFAULT_HEARTBEAT_CHECK_INTERVAL_MS,
        }
    }
}

impl ResilienceConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set maximum retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Builder: set initial backoff delay.
    #[must_use]
    pub const fn with_initial_backoff_ms(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    /// Builder: set maximum backoff delay.
    #[must_use]
    pub const fn with_max_backoff_ms(mut self, ms: u64) -> Self {
        self.max_backoff_ms = ms;
        self
    }

    /// Builder: set heartbeat timeout.
    #[must_use]
    pub const fn with_heartbeat_timeout_ms(mut self, ms: u64) -> Self {
        self.heartbeat_timeout_ms = ms;
        self
    }

    /// Builder: set request timeout.
    #[must_use]
    pub const fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    /// Builder: enable/disable auto-reconnect.
    #[must_use]
    pub const fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Builder: set liveness check interval.
    #[must_use]
    pub const fn with_heartbeat_check_interval_ms(mut self, ms: u64) -> Self {
        self.heartbeat_check_interval_ms = ms;
        self
    }

    /// Heartbeat timeout as a `Duration`.
    #[must_use]
    pub const fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Liveness check interval as a `Duration`.
    #[must_use]
    pub const fn heartbeat_check_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_check_interval_ms)
    }

    /// Validate configuration, returning errors for invalid values.
    ///
    /// # Errors
    ///
    /// Returns error strings for any invalid configuration values.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.initial_backoff_ms == 0 {
            errors.push("initial_backoff_ms must be > 0".to_string());
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            errors.push("max_backoff_ms must be >= initial_backoff_ms".to_string());
        }
        if self.heartbeat_timeout_ms == 0 {
            errors.push("heartbeat_timeout_ms must be > 0".to_string());
        }
        if self.heartbeat_check_interval_ms == 0 {
            errors.push("heartbeat_check_interval_ms must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
