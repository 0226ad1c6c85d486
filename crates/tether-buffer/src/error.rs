//! Buffer error types.

/// Error raised by a [`crate::MessageStore`] implementation.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by explicit buffer calls.
///
/// Flushes triggered by `append` never surface errors; they are logged.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// No buffer entry exists for the logical message id.
    #[error("No buffer entry for message {0}")]
    UnknownEntry(String),

    /// The message store rejected the write.
    #[error("Message store error: {0}")]
    Store(#[source] StoreError),
}

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_entry_display() {
        let e = BufferError::UnknownEntry("msg-1".into());
        assert_eq!(e.to_string(), "No buffer entry for message msg-1");
    }

    #[test]
    fn store_error_display_and_source() {
        let e = BufferError::Store("disk full".into());
        assert_eq!(e.to_string(), "Message store error: disk full");
        assert!(std::error::Error::source(&e).is_some());
    }
}
