//! Versioned classifier artifacts with atomic swap
//!
//! On-disk layout:
//!
//! ```text
//! models/
//!   CURRENT                       name of the active version
//!   performance_metrics.json      metrics of the active version
//!   versions/<version>/
//!     tfidf_vectorizer.json
//!     toxicity_classifier.json
//!     label_encoder.json
//!     performance_metrics.json
//! ```
//!
//! A new set is written into a staging directory, renamed into `versions/`,
//! and only then published by atomically replacing `CURRENT`. Readers that
//! resolve `CURRENT` therefore always load a complete set.

use async_trait::async_trait;
use chrono::Utc;
use commentguard_core::{Error, Result};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::evaluation::EvaluationMetrics;
use crate::features::TfidfVectorizer;
use crate::linear::{LabelEncoder, LogisticRegression};
use crate::scorer::Scorer;

const CURRENT_FILE: &str = "CURRENT";
const VERSIONS_DIR: &str = "versions";
const STAGING_PREFIX: &str = ".staging-";
const VECTORIZER_FILE: &str = "tfidf_vectorizer.json";
const CLASSIFIER_FILE: &str = "toxicity_classifier.json";
const ENCODER_FILE: &str = "label_encoder.json";
const METRICS_FILE: &str = "performance_metrics.json";

/// The three co-versioned pieces of a trained classifier
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    vectorizer: TfidfVectorizer,
    classifier: LogisticRegression,
    encoder: LabelEncoder,
}

impl ArtifactSet {
    /// Bundle fitted parts, checking that their shapes agree
    pub fn new(
        vectorizer: TfidfVectorizer,
        classifier: LogisticRegression,
        encoder: LabelEncoder,
    ) -> Result<Self> {
        vectorizer.validate()?;
        classifier.validate()?;
        if classifier.n_features() != vectorizer.len() {
            return Err(Error::scorer_unavailable(format!(
                "classifier expects {} features but vectorizer produces {}",
                classifier.n_features(),
                vectorizer.len()
            )));
        }
        if classifier.n_classes() != encoder.len() {
            return Err(Error::scorer_unavailable(format!(
                "classifier has {} classes but encoder has {}",
                classifier.n_classes(),
                encoder.len()
            )));
        }
        Ok(Self {
            vectorizer,
            classifier,
            encoder,
        })
    }

    /// Probability that `text` is not in the neutral category.
    ///
    /// An encoder without a neutral category treats every class as toxic.
    pub fn toxicity_probability(&self, text: &str, neutral_label: &str) -> Result<f32> {
        let proba = self.classifier.predict_proba(&self.vectorizer.transform(text)?);
        Ok(match self.encoder.position_ignore_case(neutral_label) {
            Some(neutral) => (1.0 - proba[neutral]).clamp(0.0, 1.0) as f32,
            None => 1.0,
        })
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    fn load_from(dir: &Path) -> Result<Self> {
        Self::new(
            read_json(&dir.join(VECTORIZER_FILE))?,
            read_json(&dir.join(CLASSIFIER_FILE))?,
            read_json(&dir.join(ENCODER_FILE))?,
        )
    }
}

/// Store for the active artifact set, shared by the scorer and the trainer
pub struct ArtifactStore {
    dir: PathBuf,
    versions_retained: usize,
    current: RwLock<Option<(String, Arc<ArtifactSet>)>>,
}

impl ArtifactStore {
    /// Create a store rooted at `dir`. Nothing is read until first use.
    pub fn new(dir: impl Into<PathBuf>, versions_retained: usize) -> Self {
        Self {
            dir: dir.into(),
            versions_retained: versions_retained.max(1),
            current: RwLock::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The active artifact set, loading it from disk on first call.
    ///
    /// Fails with `ScorerUnavailable` when no version has been published.
    pub fn current(&self) -> Result<Arc<ArtifactSet>> {
        if let Some((_, set)) = self.current.read().as_ref() {
            return Ok(Arc::clone(set));
        }

        let mut guard = self.current.write();
        if let Some((_, set)) = guard.as_ref() {
            return Ok(Arc::clone(set));
        }

        let version = self.read_current_version()?;
        let set = Arc::new(
            ArtifactSet::load_from(&self.versions_dir().join(&version)).map_err(|e| {
                Error::scorer_unavailable(format!("failed to load artifacts {}: {}", version, e))
            })?,
        );
        info!(version = %version, dir = %self.dir.display(), "Loaded classifier artifacts");
        *guard = Some((version, Arc::clone(&set)));
        Ok(set)
    }

    /// Name of the published version, if any
    pub fn current_version(&self) -> Option<String> {
        if let Some((version, _)) = self.current.read().as_ref() {
            return Some(version.clone());
        }
        self.read_current_version().ok()
    }

    /// Metrics of the published version, if any
    pub fn current_metrics(&self) -> Result<Option<EvaluationMetrics>> {
        let path = self.dir.join(METRICS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Write a new artifact set and publish it atomically.
    ///
    /// Returns the new version name.
    pub fn install(&self, artifacts: ArtifactSet, metrics: &EvaluationMetrics) -> Result<String> {
        let versions = self.versions_dir();
        std::fs::create_dir_all(&versions)?;

        let version = format!(
            "{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );

        let staging = versions.join(format!("{}{}", STAGING_PREFIX, version));
        std::fs::create_dir_all(&staging)?;
        let written = (|| -> Result<()> {
            write_json(&staging.join(VECTORIZER_FILE), &artifacts.vectorizer)?;
            write_json(&staging.join(CLASSIFIER_FILE), &artifacts.classifier)?;
            write_json(&staging.join(ENCODER_FILE), &artifacts.encoder)?;
            write_json(&staging.join(METRICS_FILE), metrics)?;
            Ok(())
        })();
        if let Err(e) = written {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }

        std::fs::rename(&staging, versions.join(&version))?;

        // Readers switch over only here.
        write_atomic(&self.dir, CURRENT_FILE, version.as_bytes())?;
        write_atomic(
            &self.dir,
            METRICS_FILE,
            serde_json::to_string_pretty(metrics)?.as_bytes(),
        )?;

        *self.current.write() = Some((version.clone(), Arc::new(artifacts)));
        info!(version = %version, "Published classifier artifacts");

        if let Err(e) = self.prune(&version) {
            warn!(error = %e, "Failed to prune old artifact versions");
        }

        Ok(version)
    }

    fn versions_dir(&self) -> PathBuf {
        self.dir.join(VERSIONS_DIR)
    }

    fn read_current_version(&self) -> Result<String> {
        let path = self.dir.join(CURRENT_FILE);
        let version = std::fs::read_to_string(&path).map_err(|e| {
            Error::scorer_unavailable(format!(
                "no trained classifier at {}: {}",
                self.dir.display(),
                e
            ))
        })?;
        let version = version.trim().to_string();
        if version.is_empty() {
            return Err(Error::scorer_unavailable(format!(
                "{} is empty",
                path.display()
            )));
        }
        Ok(version)
    }

    fn prune(&self, keep: &str) -> Result<()> {
        let mut versions: Vec<String> = std::fs::read_dir(self.versions_dir())?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.starts_with(STAGING_PREFIX) && name != keep)
            .collect();

        // Version names start with a UTC timestamp, so lexical order is age order.
        versions.sort();
        let excess = versions.len().saturating_sub(self.versions_retained - 1);
        for name in versions.into_iter().take(excess) {
            debug!(version = %name, "Removing old artifact version");
            std::fs::remove_dir_all(self.versions_dir().join(name))?;
        }
        Ok(())
    }
}

/// Scorer backed by the active artifact set.
///
/// The set is resolved per batch, so a swap is picked up by the next batch
/// while a batch in flight keeps the set it started with.
pub struct ArtifactScorer {
    name: String,
    store: Arc<ArtifactStore>,
    neutral_label: String,
}

impl ArtifactScorer {
    /// Create a scorer, failing if no artifact set can be loaded
    pub fn load(store: Arc<ArtifactStore>, neutral_label: impl Into<String>) -> Result<Self> {
        store.current()?;
        Ok(Self {
            name: "artifact".to_string(),
            store,
            neutral_label: neutral_label.into(),
        })
    }
}

#[async_trait]
impl Scorer for ArtifactScorer {
    async fn score(&self, texts: &[String]) -> Result<Vec<f32>> {
        let set = self.store.current()?;
        texts
            .iter()
            .map(|t| set.toxicity_probability(t, &self.neutral_label))
            .collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?
        .sync_all()?;
    Ok(())
}

/// Replace `dir/name` by writing a temp file in `dir` and renaming it over
fn write_atomic(dir: &Path, name: &str, contents: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainerConfig;
    use crate::trainer::Trainer;
    use commentguard_core::FeedbackRecord;
    use tempfile::TempDir;

    fn train(insult_word: &str) -> crate::trainer::TrainingReport {
        let records = vec![
            FeedbackRecord::new("1", format!("you {}", insult_word), "Insult"),
            FeedbackRecord::new("2", format!("{} again", insult_word), "Insult"),
            FeedbackRecord::new("3", "lovely video", "Neutral"),
            FeedbackRecord::new("4", "lovely song", "Neutral"),
        ];
        Trainer::new(TrainerConfig::default()).train(&records).unwrap()
    }

    #[test]
    fn test_missing_artifacts_is_scorer_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), 3);
        assert!(matches!(store.current(), Err(Error::ScorerUnavailable(_))));
        assert!(store.current_version().is_none());
    }

    #[test]
    fn test_install_and_reload_from_disk() {
        let dir = TempDir::new().unwrap();
        let report = train("idiot");

        let store = ArtifactStore::new(dir.path(), 3);
        let version = store.install(report.artifacts, &report.metrics).unwrap();
        assert_eq!(store.current_version().as_deref(), Some(version.as_str()));
        assert!(dir.path().join("performance_metrics.json").exists());

        // A fresh store sees the same version.
        let reopened = ArtifactStore::new(dir.path(), 3);
        let set = reopened.current().unwrap();
        assert!(set.toxicity_probability("idiot", "Neutral").unwrap() > 0.5);
        assert_eq!(
            reopened.current_metrics().unwrap().unwrap().samples,
            report.metrics.samples
        );
    }

    #[test]
    fn test_swap_replaces_active_set() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), 3);

        let first = train("idiot");
        store.install(first.artifacts, &first.metrics).unwrap();
        let before = store.current().unwrap();

        let second = train("clown");
        store.install(second.artifacts, &second.metrics).unwrap();
        let after = store.current().unwrap();

        // The old handle keeps working with the old vocabulary.
        assert!(before.vectorizer().feature_names().contains(&"idiot"));
        assert!(after.vectorizer().feature_names().contains(&"clown"));
        assert!(!after.vectorizer().feature_names().contains(&"idiot"));
    }

    #[test]
    fn test_prune_keeps_retained_versions() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), 2);

        let mut last = String::new();
        for _ in 0..4 {
            let report = train("idiot");
            last = store.install(report.artifacts, &report.metrics).unwrap();
        }

        let remaining: Vec<_> = std::fs::read_dir(dir.path().join(VERSIONS_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(dir.path().join(VERSIONS_DIR).join(&last).exists());
    }

    #[tokio::test]
    async fn test_artifact_scorer() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ArtifactStore::new(dir.path(), 3));
        assert!(ArtifactScorer::load(Arc::clone(&store), "Neutral").is_err());

        let report = train("idiot");
        store.install(report.artifacts, &report.metrics).unwrap();

        let scorer = ArtifactScorer::load(store, "Neutral").unwrap();
        let scores = scorer
            .score(&["you idiot".to_string(), "lovely".to_string()])
            .await
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);
    }
}
