//! Scorer trait

use async_trait::async_trait;
use commentguard_core::Result;

/// Score assigned to empty or whitespace-only input without consulting a model
pub const EMPTY_TEXT_SCORE: f32 = 0.0;

/// Trait for all toxicity scorers
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Score a batch of texts.
    ///
    /// Returns one toxicity probability in `[0, 1]` per input, in input order.
    async fn score(&self, texts: &[String]) -> Result<Vec<f32>>;

    /// Get the scorer name
    fn name(&self) -> &str;
}
