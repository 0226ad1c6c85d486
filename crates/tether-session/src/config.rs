//! Session configuration loaded from TOML.
//!
//! ```toml
//! [resilience]
//! max_retries = 5
//! heartbeat_timeout_ms = 60000
//!
//! [credential]
//! pre_refresh_window_ms = 120000
//!
//! [buffer]
//! chunk_batch_size = 40
//!
//! [logging]
//! format = "json"
//! ```
//!
//! Every table and key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tether_buffer::BufferConfig;
use tether_credential::CredentialConfig;
use tether_stream::ResilienceConfig;

use crate::{LogConfig, SessionError, SessionResult};

/// All settings of a [`crate::Session`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Stream resilience.
    pub resilience: ResilienceConfig,
    /// Credential refresh policy.
    pub credential: CredentialConfig,
    /// Write coalescing thresholds.
    pub buffer: BufferConfig,
    /// Tracing output.
    pub logging: LogConfig,
}

impl SessionConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConfigParse`] for malformed TOML and
    /// [`SessionError::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(content: &str) -> SessionResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SessionError::ConfigParse(e.to_string()))?;
        config.validate().map_err(SessionError::InvalidConfig)?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConfigRead`] if the file cannot be read, plus
    /// the errors of [`Self::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SessionError::ConfigRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate every section, prefixing errors with the section name.
    ///
    /// # Errors
    ///
    /// Returns error strings for any invalid configuration values.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let sections = [
            ("resilience", self.resilience.validate()),
            ("credential", self.credential.validate()),
            ("buffer", self.buffer.validate()),
        ];
        for (section, result) in sections {
            if let Err(section_errors) = result {
                errors.extend(section_errors.into_iter().map(|e| format!("{section}.{e}")));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::LogFormat;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn partial_tables_override_defaults() {
        let config = SessionConfig::from_toml_str(
            r#"
            [resilience]
            max_retries = 5
            auto_reconnect = false

            [credential]
            pre_refresh_window_ms = 120000

            [buffer]
            chunk_batch_size = 40

            [logging]
            format = "json"
            filter = "tether=debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.resilience.max_retries, 5);
        assert!(!config.resilience.auto_reconnect);
        assert_eq!(config.resilience.initial_backoff_ms, 1_000);
        assert_eq!(config.credential.pre_refresh_window_ms, 120_000);
        assert_eq!(config.credential.max_refresh_retries, 3);
        assert_eq!(config.buffer.chunk_batch_size, 40);
        assert_eq!(config.buffer.update_interval_ms, 300);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter, "tether=debug");
    }

    #[test]
    fn invalid_values_are_prefixed_by_section() {
        let err = SessionConfig::from_toml_str(
            r"
            [credential]
            max_refresh_retries = 0

            [buffer]
            chunk_batch_size = 0
            ",
        )
        .unwrap_err();

        match err {
            SessionError::InvalidConfig(errors) => assert_eq!(
                errors,
                vec![
                    "credential.max_refresh_retries must be > 0".to_string(),
                    "buffer.chunk_batch_size must be > 0".to_string(),
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = SessionConfig::from_toml_str("[resilience\nmax_retries = ").unwrap_err();
        assert!(matches!(err, SessionError::ConfigParse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = SessionConfig::from_toml_file("/nonexistent/tether.toml").unwrap_err();
        assert!(matches!(err, SessionError::ConfigRead { .. }));
    }
}
