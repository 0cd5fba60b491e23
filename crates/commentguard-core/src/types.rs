//! Core types for CommentGuard

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Literal written into unset optional feedback fields
pub const NULL_PLACEHOLDER: &str = "NULL";

/// Moderation status of a locally stored comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    /// Stored but not yet scored
    Unclassified,
    /// Scored as acceptable, or approved by a human
    Neutral,
    /// Transient label between scoring and the removal attempt
    Toxic,
    /// Pending human adjudication
    Review,
    /// Removed on the remote platform
    Deleted,
}

impl ModerationStatus {
    /// All statuses in declaration order
    pub const ALL: [ModerationStatus; 5] = [
        Self::Unclassified,
        Self::Neutral,
        Self::Toxic,
        Self::Review,
        Self::Deleted,
    ];

    /// Stable lowercase name used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Neutral => "neutral",
            Self::Toxic => "toxic",
            Self::Review => "review",
            Self::Deleted => "deleted",
        }
    }

    /// Statuses the automated ingestion path never moves a comment out of
    pub fn is_terminal_for_automation(&self) -> bool {
        matches!(self, Self::Neutral | Self::Deleted)
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unclassified" => Ok(Self::Unclassified),
            "neutral" => Ok(Self::Neutral),
            "toxic" => Ok(Self::Toxic),
            "review" => Ok(Self::Review),
            "deleted" => Ok(Self::Deleted),
            other => Err(Error::config(format!("unknown moderation status '{}'", other))),
        }
    }
}

/// What happened to the remote removal action for a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemoteOutcome {
    /// No removal was needed
    #[default]
    NotAttempted,
    /// The platform confirmed the removal
    Succeeded,
    /// The platform returned an error for this comment
    Failed,
    /// The platform was unreachable or not configured
    Unavailable,
}

impl RemoteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAttempted => "not_attempted",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for RemoteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_attempted" => Ok(Self::NotAttempted),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "unavailable" => Ok(Self::Unavailable),
            other => Err(Error::storage(format!("unknown remote outcome '{}'", other))),
        }
    }
}

/// A comment as returned by the external comment source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteComment {
    /// Platform-assigned comment identifier
    pub id: String,

    /// Author display name
    pub author: String,

    /// Comment body
    pub text: String,

    /// Like count at fetch time
    pub like_count: i64,

    /// Publication timestamp, if the platform supplied a valid one
    pub published_at: Option<DateTime<Utc>>,
}

impl RemoteComment {
    /// Create a remote comment with just an id and text
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: String::new(),
            text: text.into(),
            like_count: 0,
            published_at: None,
        }
    }

    /// Set the author display name
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the like count
    pub fn with_likes(mut self, like_count: i64) -> Self {
        self.like_count = like_count;
        self
    }

    /// Set the publication timestamp
    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }
}

/// A locally stored comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Platform-assigned identifier, immutable once stored
    pub comment_id: String,

    /// Owning video
    pub video_id: String,

    /// Author display name
    pub author: String,

    /// Comment body
    pub text: String,

    /// Like count at first sighting
    pub like_count: i64,

    /// Publication timestamp (UTC)
    pub published_at: Option<DateTime<Utc>>,

    /// Current moderation status
    pub moderation_status: ModerationStatus,

    /// Most recent toxicity probability, if scored
    pub toxicity_score: Option<f32>,

    /// Outcome of the most recent remote removal attempt
    pub remote_outcome: RemoteOutcome,
}

impl Comment {
    /// Build a new, unclassified comment from a remote sighting
    pub fn from_remote(video_id: impl Into<String>, remote: RemoteComment) -> Self {
        Self {
            comment_id: remote.id,
            video_id: video_id.into(),
            author: remote.author,
            text: remote.text,
            like_count: remote.like_count,
            published_at: remote.published_at,
            moderation_status: ModerationStatus::Unclassified,
            toxicity_score: None,
            remote_outcome: RemoteOutcome::NotAttempted,
        }
    }
}

/// A video whose comments are polled by the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredVideo {
    /// Platform video identifier
    pub video_id: String,

    /// Display link
    pub link: String,

    /// Display name
    pub name: String,

    /// When the video was registered
    pub created_at: DateTime<Utc>,
}

impl MonitoredVideo {
    /// Name to show for this video, falling back to its id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.video_id
        } else {
            &self.name
        }
    }
}

/// One row of the feedback queue used as training data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Comment the label refers to
    pub comment_id: String,

    /// Optional language tag
    pub language_type: Option<String>,

    /// Optional flagged term
    pub toxic_word: Option<String>,

    /// Comment text (the training feature)
    pub context_text: String,

    /// Category label (the training target)
    pub category: String,
}

impl FeedbackRecord {
    /// Create a record with unset language and flagged-term fields
    pub fn new(
        comment_id: impl Into<String>,
        context_text: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            comment_id: comment_id.into(),
            language_type: None,
            toxic_word: None,
            context_text: context_text.into(),
            category: category.into(),
        }
    }

    /// Set the language tag
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_type = normalize_optional(Some(language.into()));
        self
    }

    /// Set the flagged term
    pub fn with_toxic_word(mut self, word: impl Into<String>) -> Self {
        self.toxic_word = normalize_optional(Some(word.into()));
        self
    }
}

/// Treat empty strings and the `NULL` placeholder as absent
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value.filter(|v| {
        let v = v.trim();
        !v.is_empty() && v != NULL_PLACEHOLDER
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in ModerationStatus::ALL {
            assert_eq!(status.as_str().parse::<ModerationStatus>().unwrap(), status);
        }
        assert!("hidden".parse::<ModerationStatus>().is_err());
        assert_eq!(" Review ".parse::<ModerationStatus>().unwrap(), ModerationStatus::Review);
    }

    #[test]
    fn test_status_serde_is_lowercase() {
        let json = serde_json::to_string(&ModerationStatus::Deleted).unwrap();
        assert_eq!(json, "\"deleted\"");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ModerationStatus::Neutral.is_terminal_for_automation());
        assert!(ModerationStatus::Deleted.is_terminal_for_automation());
        assert!(!ModerationStatus::Review.is_terminal_for_automation());
        assert!(!ModerationStatus::Unclassified.is_terminal_for_automation());
    }

    #[test]
    fn test_comment_from_remote_starts_unclassified() {
        let remote = RemoteComment::new("c1", "hello").with_author("ann").with_likes(3);
        let comment = Comment::from_remote("vid", remote);

        assert_eq!(comment.comment_id, "c1");
        assert_eq!(comment.video_id, "vid");
        assert_eq!(comment.like_count, 3);
        assert_eq!(comment.moderation_status, ModerationStatus::Unclassified);
        assert_eq!(comment.remote_outcome, RemoteOutcome::NotAttempted);
        assert!(comment.toxicity_score.is_none());
    }

    #[test]
    fn test_feedback_placeholders_are_absent() {
        let record = FeedbackRecord::new("c1", "text", "Neutral")
            .with_language("NULL")
            .with_toxic_word("idiot");

        assert_eq!(record.language_type, None);
        assert_eq!(record.toxic_word.as_deref(), Some("idiot"));
    }
}
