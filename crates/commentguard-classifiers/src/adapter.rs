//! Lazily loaded, process-resident scorer

use commentguard_core::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactScorer, ArtifactStore};
use crate::config::{ScorerBackend, ScorerConfig};
use crate::lexicon::LexiconScorer;
use crate::scorer::{Scorer, EMPTY_TEXT_SCORE};

type Loader = Box<dyn Fn() -> Result<Arc<dyn Scorer>> + Send + Sync>;

/// Wraps a scorer backend, loading it on first use and keeping it resident.
///
/// Empty or whitespace-only texts never reach the model; they score
/// [`EMPTY_TEXT_SCORE`]. Output always has one score per input.
pub struct ScorerAdapter {
    loader: Loader,
    loaded: Mutex<Option<Arc<dyn Scorer>>>,
    batch_size: usize,
    reload_on_publish: bool,
}

impl ScorerAdapter {
    /// Create an adapter that loads the configured backend on demand
    pub fn from_config(config: &ScorerConfig, artifacts: Arc<ArtifactStore>) -> Self {
        let config = config.clone();
        let batch_size = config.batch_size;
        let backend = config.backend;
        let loader: Loader = Box::new(move || -> Result<Arc<dyn Scorer>> {
            match config.backend {
                ScorerBackend::Auto if artifacts.current_version().is_none() => {
                    info!("No trained classifier published, using the transformer");
                    load_transformer(&config)
                }
                ScorerBackend::Auto | ScorerBackend::Artifact => Ok(Arc::new(
                    ArtifactScorer::load(Arc::clone(&artifacts), config.neutral_label.clone())?,
                )),
                ScorerBackend::Lexicon => Ok(Arc::new(LexiconScorer::new()?)),
                ScorerBackend::Transformer => load_transformer(&config),
            }
        });
        let mut adapter = Self::with_loader(loader, batch_size);
        adapter.reload_on_publish = backend == ScorerBackend::Auto;
        adapter
    }

    /// Create an adapter around an already constructed scorer
    pub fn with_scorer(scorer: Arc<dyn Scorer>, batch_size: usize) -> Self {
        let adapter = Self::with_loader(
            Box::new(|| Err(Error::scorer_unavailable("scorer was reset"))),
            batch_size,
        );
        *adapter.loaded.lock() = Some(scorer);
        adapter
    }

    fn with_loader(loader: Loader, batch_size: usize) -> Self {
        Self {
            loader,
            loaded: Mutex::new(None),
            batch_size: batch_size.max(1),
            reload_on_publish: false,
        }
    }

    /// Whether the backend has been loaded
    pub fn is_loaded(&self) -> bool {
        self.loaded.lock().is_some()
    }

    /// Drop the resident backend; the next call reloads it
    pub fn reset(&self) {
        if self.loaded.lock().take().is_some() {
            debug!("Scorer reset");
        }
    }

    /// A new classifier version was published.
    ///
    /// The auto backend may have fallen back to the transformer, so it
    /// reloads; fixed backends keep what they have.
    pub fn artifacts_published(&self) {
        if self.reload_on_publish {
            self.reset();
        }
    }

    fn scorer(&self) -> Result<Arc<dyn Scorer>> {
        let mut guard = self.loaded.lock();
        if let Some(scorer) = guard.as_ref() {
            return Ok(Arc::clone(scorer));
        }

        let start = Instant::now();
        let scorer = (self.loader)().map_err(|e| match e {
            Error::ScorerUnavailable(_) => e,
            other => Error::scorer_unavailable(other.to_string()),
        })?;
        info!(
            backend = scorer.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Scorer loaded"
        );
        *guard = Some(Arc::clone(&scorer));
        Ok(scorer)
    }

    /// Score a batch of texts, one probability in `[0, 1]` per input
    pub async fn score(&self, texts: &[String]) -> Result<Vec<f32>> {
        let mut scores = vec![EMPTY_TEXT_SCORE; texts.len()];
        let pending: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return Ok(scores);
        }

        let scorer = self.scorer()?;
        let start = Instant::now();

        for chunk in pending.chunks(self.batch_size) {
            let batch: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
            let out = scorer.score(&batch).await?;
            if out.len() != batch.len() {
                return Err(Error::scoring(format!(
                    "{} returned {} scores for {} texts",
                    scorer.name(),
                    out.len(),
                    batch.len()
                )));
            }
            for (&i, p) in chunk.iter().zip(out) {
                if p.is_nan() {
                    warn!(backend = scorer.name(), "Scorer returned NaN");
                }
                scores[i] = if p.is_nan() { p } else { p.clamp(0.0, 1.0) };
            }
        }

        let elapsed = start.elapsed();
        metrics::histogram!("commentguard_scoring_latency_us").record(elapsed.as_micros() as f64);
        debug!(
            backend = scorer.name(),
            texts = pending.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "Scored batch"
        );

        Ok(scores)
    }

    /// Score one text
    pub async fn score_one(&self, text: &str) -> Result<f32> {
        let scores = self.score(&[text.to_string()]).await?;
        scores
            .into_iter()
            .next()
            .ok_or_else(|| Error::scoring("scorer returned no score"))
    }
}

#[cfg(feature = "ml-models")]
fn load_transformer(config: &ScorerConfig) -> Result<Arc<dyn Scorer>> {
    Ok(Arc::new(crate::transformer::TransformerScorer::load(
        &config.transformer,
    )?))
}

#[cfg(not(feature = "ml-models"))]
fn load_transformer(_config: &ScorerConfig) -> Result<Arc<dyn Scorer>> {
    Err(Error::scorer_unavailable(
        "transformer backend requires the ml-models feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
        value: f32,
    }

    #[async_trait]
    impl Scorer for Counting {
        async fn score(&self, texts: &[String]) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.value; texts.len()])
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn counting(value: f32, batch_size: usize) -> (ScorerAdapter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let scorer = Arc::new(Counting {
            calls: Arc::clone(&calls),
            value,
        });
        (ScorerAdapter::with_scorer(scorer, batch_size), calls)
    }

    #[tokio::test]
    async fn test_empty_texts_skip_model() {
        let (adapter, calls) = counting(0.9, 8);
        let scores = adapter
            .score(&["".to_string(), "   ".to_string()])
            .await
            .unwrap();
        assert_eq!(scores, vec![EMPTY_TEXT_SCORE, EMPTY_TEXT_SCORE]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mixed_batch_keeps_order() {
        let (adapter, _) = counting(0.7, 8);
        let scores = adapter
            .score(&["bad".to_string(), "".to_string(), "worse".to_string()])
            .await
            .unwrap();
        assert_eq!(scores, vec![0.7, EMPTY_TEXT_SCORE, 0.7]);
    }

    #[tokio::test]
    async fn test_chunks_by_batch_size() {
        let (adapter, calls) = counting(0.1, 2);
        let texts: Vec<String> = (0..5).map(|i| format!("text {}", i)).collect();
        let scores = adapter.score(&texts).await.unwrap();
        assert_eq!(scores.len(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_clamped() {
        let (adapter, _) = counting(1.7, 8);
        assert_eq!(adapter.score_one("x").await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_lazy_load_and_reset() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let adapter = ScorerAdapter::with_loader(
            Box::new(move || -> Result<Arc<dyn Scorer>> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(LexiconScorer::new()?))
            }),
            8,
        );

        assert!(!adapter.is_loaded());
        adapter.score_one("hello").await.unwrap();
        adapter.score_one("again").await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        adapter.reset();
        assert!(!adapter.is_loaded());
        adapter.score_one("reload").await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_artifacts_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(ArtifactStore::new(dir.path(), 3));
        let config = ScorerConfig {
            backend: ScorerBackend::Artifact,
            ..Default::default()
        };
        let adapter = ScorerAdapter::from_config(&config, store);

        let err = adapter.score_one("anything").await.unwrap_err();
        assert!(matches!(err, Error::ScorerUnavailable(_)));
        assert!(err.is_fatal_to_run());
    }
}
