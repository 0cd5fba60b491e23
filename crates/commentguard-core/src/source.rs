//! External comment platform collaborators
//!
//! The pipeline talks to the comment platform through two narrow traits so
//! that listing and removal can fail (or be absent) independently.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::RemoteComment;

/// Source of comments for a video
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Fetch up to `page_size` recent comments for a video
    async fn list_comments(&self, video_id: &str, page_size: usize) -> Result<Vec<RemoteComment>>;

    /// Get the source name
    fn name(&self) -> &str;
}

/// Remote moderation action on the comment platform
#[async_trait]
pub trait RemoteModerator: Send + Sync {
    /// Set the moderation status of a comment on the platform.
    ///
    /// Returns `Error::RemoteActionFailure` when the platform refuses the
    /// action and `Error::RemoteServiceUnavailable` when it cannot be reached.
    async fn set_moderation_status(
        &self,
        comment_id: &str,
        status: RemoteModerationStatus,
    ) -> Result<()>;
}

/// Moderation status values understood by the remote platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteModerationStatus {
    /// Visible to everyone
    Published,
    /// Hidden until a channel moderator approves it
    HeldForReview,
    /// Removed from the public view
    Rejected,
}

impl RemoteModerationStatus {
    /// Wire value for the platform API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::HeldForReview => "heldForReview",
            Self::Rejected => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_wire_values() {
        assert_eq!(RemoteModerationStatus::Rejected.as_str(), "rejected");
        assert_eq!(RemoteModerationStatus::HeldForReview.as_str(), "heldForReview");
        assert_eq!(RemoteModerationStatus::Published.as_str(), "published");
    }
}
