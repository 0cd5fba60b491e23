//! Mock scorers for testing
//!
//! Exercises the scorer adapter against configurable mock backends and the
//! artifact backend across a retrain-and-swap cycle.

use async_trait::async_trait;
use commentguard_classifiers::{
    ArtifactStore, Scorer, ScorerAdapter, ScorerBackend, ScorerConfig, Trainer, TrainerConfig, EMPTY_TEXT_SCORE,
};
use commentguard_core::{Error, FeedbackRecord, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// A configurable mock scorer
pub struct MockScorer {
    score: f32,
    fail_with: Option<String>,
    short_by: usize,
    call_count: AtomicU32,
}

impl MockScorer {
    pub fn new() -> Self {
        Self {
            score: 0.5,
            fail_with: None,
            short_by: 0,
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the score returned for texts without a marker
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Make every call fail with a scoring error
    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Return fewer scores than inputs
    pub fn short_by(mut self, n: usize) -> Self {
        self.short_by = n;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Scorer for MockScorer {
    async fn score(&self, texts: &[String]) -> Result<Vec<f32>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Some(message) = &self.fail_with {
            return Err(Error::scoring(message.clone()));
        }

        let mut scores: Vec<f32> = texts
            .iter()
            .map(|t| {
                if t.contains("TOXIC") {
                    0.9
                } else if t.contains("BORDERLINE") {
                    0.35
                } else {
                    self.score
                }
            })
            .collect();
        scores.truncate(texts.len().saturating_sub(self.short_by));
        Ok(scores)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_adapter_scores_per_input() {
    let mock = Arc::new(MockScorer::new().with_score(0.1));
    let adapter = ScorerAdapter::with_scorer(mock.clone(), 4);

    let scores = adapter
        .score(&texts(&["TOXIC stuff", "fine", "", "BORDERLINE take"]))
        .await
        .unwrap();

    assert_eq!(scores, vec![0.9, 0.1, EMPTY_TEXT_SCORE, 0.35]);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_adapter_propagates_scoring_error() {
    let mock = Arc::new(MockScorer::new().failing("model crashed"));
    let adapter = ScorerAdapter::with_scorer(mock, 4);

    let err = adapter.score(&texts(&["hello"])).await.unwrap_err();
    assert!(matches!(err, Error::Scoring(_)));
    assert!(!err.is_fatal_to_run());
}

#[tokio::test]
async fn test_adapter_rejects_short_output() {
    let mock = Arc::new(MockScorer::new().short_by(1));
    let adapter = ScorerAdapter::with_scorer(mock, 4);

    let err = adapter.score(&texts(&["a text", "another"])).await.unwrap_err();
    assert!(matches!(err, Error::Scoring(_)));
}

#[tokio::test]
async fn test_artifact_backend_picks_up_swap() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ArtifactStore::new(dir.path(), 3));
    let trainer = Trainer::new(TrainerConfig::default());

    let first = vec![
        FeedbackRecord::new("1", "you idiot", "Insult"),
        FeedbackRecord::new("2", "idiot again", "Insult"),
        FeedbackRecord::new("3", "nice clown costume", "Neutral"),
        FeedbackRecord::new("4", "nice video", "Neutral"),
    ];
    let report = trainer.train(&first).unwrap();
    store.install(report.artifacts, &report.metrics).unwrap();

    let adapter = ScorerAdapter::from_config(&ScorerConfig::default(), Arc::clone(&store));
    let before = adapter.score_one("clown").await.unwrap();
    assert!(adapter.is_loaded());

    // Relabel: "clown" is now an insult.
    let second = vec![
        FeedbackRecord::new("1", "you clown", "Insult"),
        FeedbackRecord::new("2", "clown again", "Insult"),
        FeedbackRecord::new("3", "nice idiot costume", "Neutral"),
        FeedbackRecord::new("4", "nice video", "Neutral"),
    ];
    let report = trainer.train(&second).unwrap();
    store.install(report.artifacts, &report.metrics).unwrap();

    let after = adapter.score_one("clown").await.unwrap();
    assert!(before < 0.5, "before swap {}", before);
    assert!(after > 0.5, "after swap {}", after);
}

fn install_first_model(store: &ArtifactStore) {
    let records = vec![
        FeedbackRecord::new("1", "you idiot", "Insult"),
        FeedbackRecord::new("2", "idiot again", "Insult"),
        FeedbackRecord::new("3", "nice costume", "Neutral"),
        FeedbackRecord::new("4", "nice video", "Neutral"),
    ];
    let report = Trainer::new(TrainerConfig::default()).train(&records).unwrap();
    store.install(report.artifacts, &report.metrics).unwrap();
}

#[tokio::test]
async fn test_auto_backend_prefers_published_classifier() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ArtifactStore::new(dir.path(), 3));
    install_first_model(&store);

    let adapter = ScorerAdapter::from_config(&ScorerConfig::default(), Arc::clone(&store));
    let score = adapter.score_one("you idiot").await.unwrap();
    assert!(score > 0.5, "insult scored {}", score);

    // Publishing makes the auto backend re-resolve on next use.
    adapter.artifacts_published();
    assert!(!adapter.is_loaded());
    adapter.score_one("nice video").await.unwrap();
    assert!(adapter.is_loaded());
}

#[tokio::test]
async fn test_fixed_backend_stays_loaded_on_publish() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ArtifactStore::new(dir.path(), 3));
    install_first_model(&store);

    let config = ScorerConfig {
        backend: ScorerBackend::Artifact,
        ..ScorerConfig::default()
    };
    let adapter = ScorerAdapter::from_config(&config, store);
    adapter.score_one("you idiot").await.unwrap();

    adapter.artifacts_published();
    assert!(adapter.is_loaded());
}
