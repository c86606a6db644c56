//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Protocol error (invalid message format).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Storage collaborator failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// No conflict is recorded for the given document.
    #[error("no conflict recorded for note {note_id}")]
    ConflictNotFound {
        /// Document identifier the caller asked about.
        note_id: String,
    },

    /// Persistence I/O failure (queue snapshot or config document).
    #[error("persistence error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state could not be serialized or parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried on a later cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Io(_) => true,
            _ => false,
        }
    }
}

impl From<notesync_protocol::ProtocolError> for SyncError {
    fn from(err: notesync_protocol::ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad certificate").is_retryable());
        assert!(!SyncError::Protocol("garbled".into()).is_retryable());
    }

    #[test]
    fn conflict_not_found_names_the_note() {
        let err = SyncError::ConflictNotFound {
            note_id: "note-42".into(),
        };
        assert!(err.to_string().contains("note-42"));
    }
}
