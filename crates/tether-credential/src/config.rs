//! Credential refresh policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default pre-refresh window: refresh when less than this remains (milliseconds).
pub const DEFAULT_PRE_REFRESH_WINDOW_MS: u64 = 5 * 60 * 1_000;

/// Default timeout for a single refresh attempt (milliseconds).
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 30_000;

/// Default number of refresh attempts per refresh request.
pub const DEFAULT_MAX_REFRESH_RETRIES: u32 = 3;

/// Default pause between refresh attempts (milliseconds).
pub const DEFAULT_REFRESH_RETRY_INTERVAL_MS: u64 = 2_000;

/// Settings for [`crate::CredentialManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// A credential expiring within this window is `ExpiringSoon`.
    pub pre_refresh_window_ms: u64,

    /// Each refresh attempt is abandoned after this long.
    pub refresh_timeout_ms: u64,

    /// Total attempts per refresh request.
    pub max_refresh_retries: u32,

    /// Pause between failed attempts.
    pub refresh_retry_interval_ms: u64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            pre_refresh_window_ms: DEFAULT_PRE_REFRESH_WINDOW_MS,
            refresh_timeout_ms: DEFAULT_REFRESH_TIMEOUT_MS,
            max_refresh_retries: DEFAULT_MAX_REFRESH_RETRIES,
            refresh_retry_interval_ms: DEFAULT_REFRESH_RETRY_INTERVAL_MS,
        }
    }
}

impl CredentialConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pre-refresh window.
    #[must_use]
    pub const fn with_pre_refresh_window_ms(mut self, ms: u64) -> Self {
        self.pre_refresh_window_ms = ms;
        self
    }

    /// Set the per-attempt refresh timeout.
    #[must_use]
    pub const fn with_refresh_timeout_ms(mut self, ms: u64) -> Self {
        self.refresh_timeout_ms = ms;
        self
    }

    /// Set the number of refresh attempts.
    #[must_use]
    pub const fn with_max_refresh_retries(mut self, retries: u32) -> Self {
        self.max_refresh_retries = retries;
        self
    }

    /// Set the pause between refresh attempts.
    #[must_use]
    pub const fn with_refresh_retry_interval_ms(mut self, ms: u64) -> Self {
        self.refresh_retry_interval_ms = ms;
        self
    }

    /// Pre-refresh window as a [`Duration`].
    #[must_use]
    pub const fn pre_refresh_window(&self) -> Duration {
        Duration::from_millis(self.pre_refresh_window_ms)
    }

    /// Per-attempt timeout as a [`Duration`].
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Retry pause as a [`Duration`].
    #[must_use]
    pub const fn refresh_retry_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_retry_interval_ms)
    }

    /// Validate configuration, returning errors for invalid values.
    ///
    /// # Errors
    ///
    /// Returns error strings for any invalid configuration values.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.refresh_timeout_ms == 0 {
            errors.push("refresh_timeout_ms must be > 0".to_string());
        }
        if self.max_refresh_retries == 0 {
            errors.push("max_refresh_retries must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
