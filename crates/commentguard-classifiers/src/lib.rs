//! CommentGuard Classifiers
//!
//! Toxicity scoring and the feedback-driven retraining loop.
//!
//! Scorers are loaded lazily behind a [`ScorerAdapter`] and kept resident
//! for the life of the process. The backends are:
//! - `auto` (default): the artifact classifier once one is published,
//!   otherwise the transformer
//! - `artifact`: TF-IDF + logistic regression trained from the feedback queue
//! - `transformer`: a pretrained BERT toxicity model (`ml-models` feature)
//! - `lexicon`: a dependency-light word list, useful offline
//!
//! The [`Trainer`] fits a fresh artifact set from labelled feedback and the
//! [`ArtifactStore`] swaps it in atomically.

pub mod adapter;
pub mod artifact;
pub mod config;
pub mod evaluation;
pub mod features;
pub mod lexicon;
pub mod linear;
pub mod scorer;
pub mod trainer;
#[cfg(feature = "ml-models")]
pub mod transformer;

pub use adapter::ScorerAdapter;
pub use artifact::{ArtifactScorer, ArtifactSet, ArtifactStore};
pub use config::{DeviceSpec, ScorerBackend, ScorerConfig, TrainerConfig, TransformerConfig};
pub use evaluation::EvaluationMetrics;
pub use features::TfidfVectorizer;
pub use lexicon::LexiconScorer;
pub use linear::{LabelEncoder, LogisticRegression};
pub use scorer::{Scorer, EMPTY_TEXT_SCORE};
pub use trainer::{Trainer, TrainingReport};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::adapter::ScorerAdapter;
    pub use crate::artifact::{ArtifactSet, ArtifactStore};
    pub use crate::config::{ScorerBackend, ScorerConfig, TrainerConfig};
    pub use crate::scorer::Scorer;
    pub use crate::trainer::{Trainer, TrainingReport};
}
