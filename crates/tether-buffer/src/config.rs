//! Buffer flush thresholds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum staleness of persisted content (milliseconds).
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 300;

/// Default number of chunks between forced flushes.
pub const DEFAULT_CHUNK_BATCH_SIZE: u64 = 20;

/// Count and time thresholds of a [`crate::StreamBuffer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Flush when the last flush is older than this; also the delay of scheduled flushes.
    pub update_interval_ms: u64,

    /// Flush whenever an entry's chunk count is a multiple of this.
    pub chunk_batch_size: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            chunk_batch_size: DEFAULT_CHUNK_BATCH_SIZE,
        }
    }
}

impl BufferConfig {
    /// Set the update interval.
    #[must_use]
    pub const fn with_update_interval_ms(mut self, ms: u64) -> Self {
        self.update_interval_ms = ms;
        self
    }

    /// Set the chunk batch size.
    #[must_use]
    pub const fn with_chunk_batch_size(mut self, size: u64) -> Self {
        self.chunk_batch_size = size;
        self
    }

    /// Update interval as a [`Duration`].
    #[must_use]
    pub const fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Validate configuration, returning errors for invalid values.
    ///
    /// # Errors
    ///
    /// Returns error strings for any invalid configuration values.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.chunk_batch_size == 0 {
            errors.push("chunk_batch_size must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
