//! Full retraining from the feedback queue

use chrono::Utc;
use commentguard_core::{Error, FeedbackRecord, Result};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::artifact::ArtifactSet;
use crate::config::TrainerConfig;
use crate::evaluation::{classification_scores, roc_auc_ovr, EvaluationMetrics};
use crate::features::{SparseVector, TfidfVectorizer};
use crate::linear::{FitParams, LabelEncoder, LogisticRegression};

/// Result of one training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Freshly fitted vectorizer, classifier and label encoder
    pub artifacts: ArtifactSet,

    /// Metrics measured against the training set
    pub metrics: EvaluationMetrics,
}

/// Fits a fresh artifact set from labelled feedback records
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train on the whole record set.
    ///
    /// Every run is a full retrain: the text of each record is the feature
    /// and its category the target. Record order does not matter.
    pub fn train(&self, records: &[FeedbackRecord]) -> Result<TrainingReport> {
        if records.is_empty() {
            return Err(Error::training("no feedback records to train on"));
        }
        let start = Instant::now();

        let texts: Vec<&str> = records.iter().map(|r| r.context_text.as_str()).collect();
        let labels: Vec<&str> = records.iter().map(|r| r.category.as_str()).collect();

        let vectorizer = TfidfVectorizer::fit(&texts, self.config.max_features)?;
        let encoder = LabelEncoder::fit(&labels);
        let y = encoder.transform_all(&labels)?;
        let x: Vec<SparseVector> = texts
            .iter()
            .map(|t| vectorizer.transform(t))
            .collect::<Result<_>>()?;

        debug!(
            samples = records.len(),
            features = vectorizer.len(),
            classes = encoder.len(),
            "Fitting classifier"
        );

        let classifier = LogisticRegression::fit(
            &x,
            &y,
            encoder.len(),
            vectorizer.len(),
            FitParams {
                c: self.config.c,
                max_iter: self.config.max_iter,
                learning_rate: self.config.learning_rate,
                tolerance: self.config.tolerance,
            },
        )?;

        let proba: Vec<Vec<f64>> = x.iter().map(|s| classifier.predict_proba(s)).collect();
        let y_pred: Vec<usize> = proba.iter().map(|p| crate::linear::argmax(p)).collect();
        let scores = classification_scores(&y, &y_pred, encoder.len());

        let mut class_distribution = BTreeMap::new();
        for &label in &labels {
            *class_distribution.entry(label.to_string()).or_insert(0) += 1;
        }

        let top_features = self.top_features(&vectorizer, &classifier, &encoder);

        let metrics = EvaluationMetrics {
            accuracy: scores.accuracy,
            precision: scores.precision,
            recall: scores.recall,
            f1: scores.f1,
            confusion_matrix: scores.confusion_matrix,
            roc_auc: roc_auc_ovr(&y, &proba, encoder.len()),
            class_distribution,
            top_features,
            samples: records.len(),
            trained_at: Utc::now(),
        };

        info!(
            samples = records.len(),
            classes = encoder.len(),
            iterations = classifier.n_iter(),
            accuracy = metrics.accuracy,
            f1 = metrics.f1,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Classifier trained"
        );

        Ok(TrainingReport {
            artifacts: ArtifactSet::new(vectorizer, classifier, encoder)?,
            metrics,
        })
    }

    fn top_features(
        &self,
        vectorizer: &TfidfVectorizer,
        classifier: &LogisticRegression,
        encoder: &LabelEncoder,
    ) -> BTreeMap<String, Vec<String>> {
        let names = vectorizer.feature_names();
        let mut top = BTreeMap::new();

        for (class, label) in encoder.classes().iter().enumerate() {
            let Some(coefs) = classifier.coefficients(class) else {
                continue;
            };
            let mut order: Vec<usize> = (0..coefs.len()).collect();
            order.sort_by(|&a, &b| coefs[b].total_cmp(&coefs[a]).then(a.cmp(&b)));
            let features = order
                .into_iter()
                .take(self.config.top_features)
                .map(|i| names[i].to_string())
                .collect();
            top.insert(label.clone(), features);
        }
        top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<FeedbackRecord> {
        let mut out = Vec::new();
        for (i, text) in [
            "you are an idiot",
            "what an idiot move",
            "total idiot behaviour",
            "shut up idiot",
        ]
        .iter()
        .enumerate()
        {
            out.push(FeedbackRecord::new(format!("t{}", i), *text, "Insult"));
        }
        for (i, text) in [
            "great video thanks",
            "thanks for sharing this",
            "loved the music",
            "great editing and music",
        ]
        .iter()
        .enumerate()
        {
            out.push(FeedbackRecord::new(format!("n{}", i), *text, "Neutral"));
        }
        out
    }

    #[test]
    fn test_train_produces_metrics() {
        let trainer = Trainer::new(TrainerConfig::default());
        let report = trainer.train(&records()).unwrap();

        assert_eq!(report.metrics.samples, 8);
        assert_eq!(report.metrics.class_distribution["Insult"], 4);
        assert_eq!(report.metrics.class_distribution["Neutral"], 4);
        assert_eq!(report.metrics.confusion_matrix.len(), 2);
        assert!(report.metrics.accuracy >= 0.99);
        assert!(report.metrics.roc_auc.is_some());
        assert_eq!(report.metrics.top_features["Insult"][0], "idiot");
        assert_eq!(report.metrics.top_features["Neutral"].len(), 5);
    }

    #[test]
    fn test_trained_artifacts_score_toxicity() {
        let trainer = Trainer::new(TrainerConfig::default());
        let report = trainer.train(&records()).unwrap();

        let toxic = report
            .artifacts
            .toxicity_probability("such an idiot", "Neutral")
            .unwrap();
        let clean = report
            .artifacts
            .toxicity_probability("thanks, great music", "Neutral")
            .unwrap();
        assert!(toxic > 0.5, "toxic score {}", toxic);
        assert!(clean < 0.5, "clean score {}", clean);
    }

    #[test]
    fn test_single_category_cannot_train() {
        let trainer = Trainer::new(TrainerConfig::default());
        let only_neutral = vec![
            FeedbackRecord::new("a", "nice one", "Neutral"),
            FeedbackRecord::new("b", "good stuff", "Neutral"),
        ];
        assert!(matches!(
            trainer.train(&only_neutral),
            Err(Error::Training(_))
        ));
    }

    #[test]
    fn test_empty_records_rejected() {
        let trainer = Trainer::new(TrainerConfig::default());
        assert!(trainer.train(&[]).is_err());
    }
}
