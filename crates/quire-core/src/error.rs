//! Error types for quire-core

use thiserror::Error;

/// Result type alias using quire-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quire-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A remote store call did not complete
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The caller's role does not allow the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The reporter already filed a report against this content
    #[error("Content {content_id} was already reported by {reporter_id}")]
    AlreadyReported {
        content_id: String,
        reporter_id: String,
    },

    /// Operation referenced a missing journal or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resolver was handed records it cannot reconcile
    #[error("Conflict cannot be resolved: {0}")]
    ConflictUnresolvable(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure is transient and the operation may be retried.
    ///
    /// Policy errors (permissions, duplicate reports) are never retried.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }

    pub(crate) fn permission(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_are_retryable() {
        assert!(Error::NetworkFailure("timeout".into()).is_retryable());
        assert!(!Error::permission("not an admin").is_retryable());
        assert!(!Error::AlreadyReported {
            content_id: "c1".into(),
            reporter_id: "u1".into(),
        }
        .is_retryable());
        assert!(!Error::NotFound("journal j1".into()).is_retryable());
    }

    #[test]
    fn already_reported_message_names_content_and_reporter() {
        let error = Error::AlreadyReported {
            content_id: "entry-7".into(),
            reporter_id: "bob".into(),
        };
        assert_eq!(
            error.to_string(),
            "Content entry-7 was already reported by bob"
        );
    }
}
