//! CommentGuard Moderator
//!
//! The end-to-end moderation loop for a YouTube channel:
//! - `pipeline`: ingestion, reclassification and human review over the
//!   comment store, scorer and decision policy
//! - `retrain`: the feedback-queue retrain trigger checked before each run
//! - `youtube`: the YouTube Data API comment source and remote moderator
//! - `settings`: layered file and environment configuration
//! - `cli`: the `commentguard` command line

pub mod app;
pub mod cli;
pub mod pipeline;
pub mod retrain;
pub mod settings;
pub mod youtube;

pub use app::{describe_metrics, App};
pub use cli::{Cli, Commands};
pub use pipeline::{IngestReport, Moderator, ReclassifyReport, RunReport};
pub use retrain::{Pending, RetrainOutcome, RetrainTrigger, SkipReason};
pub use settings::Settings;
pub use youtube::YoutubeClient;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::app::App;
    pub use crate::pipeline::{IngestReport, Moderator};
    pub use crate::retrain::{RetrainOutcome, RetrainTrigger};
    pub use crate::settings::Settings;
}
