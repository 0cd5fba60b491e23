//! CommentGuard Store
//!
//! Durable local state for the moderation pipeline:
//! - SQLite comment and video store with get-or-create semantics
//! - Append-only feedback queue in delimited-text form
//! - High-water mark consumed by the retrain trigger
//! - Hash-chained JSONL audit log of moderation transitions
//!
//! All components assume a single writer process.

pub mod audit;
pub mod comments;
pub mod feedback;
pub mod watermark;

pub use audit::{AuditLog, AuditVerification, ModerationEvent};
pub use comments::{CommentFilter, CommentStore, Insertion, ModerationStats};
pub use feedback::FeedbackQueue;
pub use watermark::HighWaterMark;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditLog, ModerationEvent};
    pub use crate::comments::{CommentFilter, CommentStore, Insertion};
    pub use crate::feedback::FeedbackQueue;
    pub use crate::watermark::HighWaterMark;
}
