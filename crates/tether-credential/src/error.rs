//! Credential error types.

/// Credential lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// No refresh operation was registered.
    #[error("No refresh operation registered")]
    NoRefreshOperation,
}

/// Result type for credential operations.
pub type CredentialResult<T> = Result<T, CredentialError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_refresh_operation_display() {
        assert_eq!(
            CredentialError::NoRefreshOperation.to_string(),
            "No refresh operation registered"
        );
    }
}
