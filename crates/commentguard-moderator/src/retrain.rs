//! Feedback-driven retrain trigger
//!
//! `pending = queue length - high-water mark`. When `pending` reaches the
//! threshold the trainer runs synchronously over the whole queue, the new
//! artifact set is swapped in, and the mark advances to the queue length
//! read when the retrain started.

use commentguard_classifiers::{ArtifactStore, EvaluationMetrics, Trainer};
use commentguard_core::Result;
use commentguard_store::{FeedbackQueue, HighWaterMark};
use std::sync::Arc;
use tracing::{info, warn};

/// Queue accounting at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    /// Records in the feedback queue
    pub queue_len: usize,

    /// Records consumed by the last retrain
    pub high_water_mark: usize,

    /// Records added since the last retrain
    pub pending: usize,
}

/// Why a retrain did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The queue file does not exist
    MissingQueue,
    /// The queue file has no readable records
    EmptyQueue,
    /// Not enough new records yet
    BelowThreshold { pending: usize, threshold: usize },
}

/// Result of a retrain check
#[derive(Debug, Clone, PartialEq)]
pub enum RetrainOutcome {
    /// A new artifact set is active
    Retrained {
        version: String,
        samples: usize,
        metrics: EvaluationMetrics,
    },
    /// Nothing changed
    Skipped(SkipReason),
}

impl RetrainOutcome {
    pub fn is_retrained(&self) -> bool {
        matches!(self, Self::Retrained { .. })
    }
}

/// Watches the feedback queue and retrains when enough records accumulate
pub struct RetrainTrigger {
    queue: FeedbackQueue,
    mark: HighWaterMark,
    trainer: Trainer,
    artifacts: Arc<ArtifactStore>,
    threshold: usize,
}

impl RetrainTrigger {
    pub fn new(
        queue: FeedbackQueue,
        mark: HighWaterMark,
        trainer: Trainer,
        artifacts: Arc<ArtifactStore>,
        threshold: usize,
    ) -> Self {
        Self {
            queue,
            mark,
            trainer,
            artifacts,
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Current queue accounting
    pub fn pending(&self) -> Result<Pending> {
        let queue_len = self.queue.len()?;
        let high_water_mark = self.mark.read()?;
        if high_water_mark > queue_len {
            warn!(
                queue_len,
                high_water_mark,
                queue = %self.queue.path().display(),
                "High-water mark exceeds queue length; was the queue truncated?"
            );
        }
        Ok(Pending {
            queue_len,
            high_water_mark,
            pending: queue_len.saturating_sub(high_water_mark),
        })
    }

    /// Retrain if the pending count has reached the threshold
    pub fn check_and_run(&self) -> Result<RetrainOutcome> {
        self.retrain(false)
    }

    /// Retrain now when `force` is set, otherwise only past the threshold.
    ///
    /// A missing or empty queue is a no-op in both cases.
    pub fn retrain(&self, force: bool) -> Result<RetrainOutcome> {
        if !self.queue.exists() {
            info!(queue = %self.queue.path().display(), "No feedback queue; skipping retrain");
            return Ok(RetrainOutcome::Skipped(SkipReason::MissingQueue));
        }

        let records = self.queue.read_all()?;
        if records.is_empty() {
            info!(queue = %self.queue.path().display(), "Feedback queue is empty; skipping retrain");
            return Ok(RetrainOutcome::Skipped(SkipReason::EmptyQueue));
        }

        let queue_len = records.len();
        let high_water_mark = self.mark.read()?;
        let pending = queue_len.saturating_sub(high_water_mark);
        if !force && pending < self.threshold {
            return Ok(RetrainOutcome::Skipped(SkipReason::BelowThreshold {
                pending,
                threshold: self.threshold,
            }));
        }

        info!(
            queue_len,
            high_water_mark,
            pending,
            force,
            "Retraining classifier from feedback queue"
        );

        let report = self.trainer.train(&records)?;
        let metrics = report.metrics.clone();
        let version = self.artifacts.install(report.artifacts, &report.metrics)?;
        self.mark.write(queue_len)?;

        metrics::counter!("commentguard_retrains_total").increment(1);
        info!(
            version = %version,
            samples = queue_len,
            accuracy = metrics.accuracy,
            "Retrain complete"
        );

        Ok(RetrainOutcome::Retrained {
            version,
            samples: queue_len,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commentguard_classifiers::TrainerConfig;
    use commentguard_core::FeedbackRecord;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        queue: FeedbackQueue,
        mark: HighWaterMark,
        artifacts: Arc<ArtifactStore>,
        trigger: RetrainTrigger,
    }

    fn fixture(threshold: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let queue = FeedbackQueue::new(dir.path().join("retrain_queue.csv"));
        let mark = HighWaterMark::new(dir.path().join("retrain_flag.txt"));
        let artifacts = Arc::new(ArtifactStore::new(dir.path().join("models"), 3));
        let trigger = RetrainTrigger::new(
            queue.clone(),
            mark.clone(),
            Trainer::new(TrainerConfig::default()),
            Arc::clone(&artifacts),
            threshold,
        );
        Fixture {
            _dir: dir,
            queue,
            mark,
            artifacts,
            trigger,
        }
    }

    fn fill(queue: &FeedbackQueue, n: usize) {
        for i in 0..n {
            let record = if i % 2 == 0 {
                FeedbackRecord::new(format!("t{}", i), format!("you idiot number {}", i), "Insult")
            } else {
                FeedbackRecord::new(format!("n{}", i), format!("lovely video part {}", i), "Neutral")
            };
            queue.append(&record).unwrap();
        }
    }

    #[test]
    fn test_missing_queue_is_noop() {
        let f = fixture(20);
        assert_eq!(
            f.trigger.retrain(true).unwrap(),
            RetrainOutcome::Skipped(SkipReason::MissingQueue)
        );
        assert_eq!(f.mark.read().unwrap(), 0);
    }

    #[test]
    fn test_empty_queue_is_noop() {
        let f = fixture(20);
        std::fs::write(f.queue.path(), "").unwrap();

        assert_eq!(
            f.trigger.retrain(true).unwrap(),
            RetrainOutcome::Skipped(SkipReason::EmptyQueue)
        );
        assert_eq!(f.mark.read().unwrap(), 0);
        assert!(f.artifacts.current_version().is_none());
    }

    #[test]
    fn test_fires_at_threshold_and_advances_mark() {
        let f = fixture(20);
        fill(&f.queue, 19);
        assert_eq!(
            f.trigger.check_and_run().unwrap(),
            RetrainOutcome::Skipped(SkipReason::BelowThreshold {
                pending: 19,
                threshold: 20
            })
        );

        fill(&f.queue, 6);
        let pending = f.trigger.pending().unwrap();
        assert_eq!(pending.queue_len, 25);
        assert_eq!(pending.pending, 25);

        let outcome = f.trigger.check_and_run().unwrap();
        assert!(outcome.is_retrained());
        assert_eq!(f.mark.read().unwrap(), 25);
        assert!(f.artifacts.current().is_ok());

        // Five more records are not enough for another run.
        fill(&f.queue, 5);
        assert_eq!(f.trigger.pending().unwrap().pending, 5);
        assert!(!f.trigger.check_and_run().unwrap().is_retrained());
    }

    #[test]
    fn test_force_ignores_threshold() {
        let f = fixture(20);
        fill(&f.queue, 4);
        match f.trigger.retrain(true).unwrap() {
            RetrainOutcome::Retrained { samples, metrics, .. } => {
                assert_eq!(samples, 4);
                assert_eq!(metrics.samples, 4);
            }
            other => panic!("expected retrain, got {:?}", other),
        }
        assert_eq!(f.mark.read().unwrap(), 4);
    }

    #[test]
    fn test_mark_above_queue_length_saturates() {
        let f = fixture(20);
        fill(&f.queue, 3);
        f.mark.write(10).unwrap();
        assert_eq!(f.trigger.pending().unwrap().pending, 0);
    }

    #[test]
    fn test_training_failure_leaves_mark() {
        let f = fixture(1);
        // A single category cannot be trained.
        f.queue
            .append(&FeedbackRecord::new("a", "fine words", "Neutral"))
            .unwrap();
        assert!(f.trigger.check_and_run().is_err());
        assert_eq!(f.mark.read().unwrap(), 0);
    }
}
