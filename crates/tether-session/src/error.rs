//! Session error types.

use tether_buffer::BufferError;
use tether_credential::CredentialError;

/// Session-level errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Configuration file could not be read.
    #[error("Failed to read config {path}: {message}")]
    ConfigRead {
        /// File path.
        path: String,
        /// Underlying I/O error.
        message: String,
    },

    /// Configuration could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    /// Configuration values are invalid.
    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Tracing could not be initialised.
    #[error("Tracing initialisation failed: {0}")]
    Telemetry(String),

    /// Credential lifecycle error.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Buffer error.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_joins_messages() {
        let e = SessionError::InvalidConfig(vec![
            "resilience.initial_backoff_ms must be > 0".into(),
            "buffer.chunk_batch_size must be > 0".into(),
        ]);
        assert_eq!(
            e.to_string(),
            "Invalid configuration: resilience.initial_backoff_ms must be > 0; buffer.chunk_batch_size must be > 0"
        );
    }

    #[test]
    fn credential_error_is_transparent() {
        let e = SessionError::from(CredentialError::NoRefreshOperation);
        assert_eq!(e.to_string(), "No refresh operation registered");
    }

    #[test]
    fn config_read_display() {
        let e = SessionError::ConfigRead {
            path: "/etc/tether.toml".into(),
            message: "not found".into(),
        };
        assert_eq!(e.to_string(), "Failed to read config /etc/tether.toml: not found");
    }
}
