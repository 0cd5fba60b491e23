//! CommentGuard Core
//!
//! Core types, traits, and utilities shared across CommentGuard components.
//!
//! This crate provides:
//! - The comment, video, and feedback data model
//! - The moderation status enum shared by the policy, store, and pipeline
//! - Error types and result handling for every failure category
//! - Traits for the external comment platform (listing and remote moderation)

pub mod error;
pub mod source;
pub mod types;

pub use error::{Error, Result};
pub use source::{CommentSource, RemoteModerationStatus, RemoteModerator};
pub use types::{
    Comment, FeedbackRecord, ModerationStatus, MonitoredVideo, RemoteComment, RemoteOutcome,
    NULL_PLACEHOLDER,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::source::{CommentSource, RemoteModerationStatus, RemoteModerator};
    pub use crate::types::{Comment, FeedbackRecord, ModerationStatus, RemoteComment, RemoteOutcome};
}
