//! Error types for CommentGuard

use crate::types::ModerationStatus;

/// Result type alias using CommentGuard's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for CommentGuard operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The scoring model could not be loaded. Fatal to an ingestion run.
    #[error("scorer unavailable: {0}")]
    ScorerUnavailable(String),

    /// Scoring a single input failed after the model was loaded
    #[error("scoring error: {0}")]
    Scoring(String),

    /// The remote platform rejected or failed a moderation action
    #[error("remote action failed for comment {comment_id}: {message}")]
    RemoteActionFailure { comment_id: String, message: String },

    /// The remote platform cannot be reached or is not configured
    #[error("remote service unavailable: {0}")]
    RemoteServiceUnavailable(String),

    /// Training the classifier failed
    #[error("training error: {0}")]
    Training(String),

    /// A moderation transition that the state machine does not allow
    #[error("invalid moderation transition: {from} -> {to}")]
    InvalidTransition {
        from: ModerationStatus,
        to: ModerationStatus,
    },

    /// A referenced comment or video does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Local persistence errors
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new scorer-unavailable error
    pub fn scorer_unavailable(msg: impl Into<String>) -> Self {
        Self::ScorerUnavailable(msg.into())
    }

    /// Create a new scoring error
    pub fn scoring(msg: impl Into<String>) -> Self {
        Self::Scoring(msg.into())
    }

    /// Create a new remote action failure for a comment
    pub fn remote_action(comment_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RemoteActionFailure {
            comment_id: comment_id.into(),
            message: msg.into(),
        }
    }

    /// Create a new remote-service-unavailable error
    pub fn remote_unavailable(msg: impl Into<String>) -> Self {
        Self::RemoteServiceUnavailable(msg.into())
    }

    /// Create a new training error
    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error must abort a whole ingestion run.
    ///
    /// Only a missing scorer qualifies: no comment can be classified safely
    /// without it. Every other error is isolated to one comment or video.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Self::ScorerUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_scorer_unavailable_is_fatal() {
        assert!(Error::scorer_unavailable("no model").is_fatal_to_run());
        assert!(!Error::remote_action("c1", "403").is_fatal_to_run());
        assert!(!Error::remote_unavailable("offline").is_fatal_to_run());
        assert!(!Error::scoring("bad input").is_fatal_to_run());
        assert!(!Error::storage("locked").is_fatal_to_run());
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::remote_action("abc123", "quota exceeded");
        assert_eq!(
            err.to_string(),
            "remote action failed for comment abc123: quota exceeded"
        );

        let err = Error::InvalidTransition {
            from: ModerationStatus::Deleted,
            to: ModerationStatus::Review,
        };
        assert_eq!(err.to_string(), "invalid moderation transition: deleted -> review");
    }
}
