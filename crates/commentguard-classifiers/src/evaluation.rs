//! Evaluation metrics for a trained classifier

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot written next to each artifact set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Fraction of samples predicted correctly
    pub accuracy: f64,

    /// Support-weighted precision
    pub precision: f64,

    /// Support-weighted recall
    pub recall: f64,

    /// Support-weighted F1
    pub f1: f64,

    /// Rows are true classes, columns predicted classes, in encoder order
    pub confusion_matrix: Vec<Vec<usize>>,

    /// Macro one-vs-rest ROC AUC; null when some class has no negatives
    pub roc_auc: Option<f64>,

    /// Samples per category
    pub class_distribution: BTreeMap<String, usize>,

    /// Highest-weighted features per category
    pub top_features: BTreeMap<String, Vec<String>>,

    /// Number of training samples
    pub samples: usize,

    /// When training finished
    pub trained_at: DateTime<Utc>,
}

/// Accuracy, weighted precision/recall/F1 and the confusion matrix
pub(crate) struct ClassificationScores {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion_matrix: Vec<Vec<usize>>,
}

pub(crate) fn classification_scores(
    y_true: &[usize],
    y_pred: &[usize],
    n_classes: usize,
) -> ClassificationScores {
    let mut confusion = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        confusion[t][p] += 1;
    }

    let n = y_true.len();
    let correct: usize = (0..n_classes).map(|c| confusion[c][c]).sum();
    let accuracy = if n == 0 { 0.0 } else { correct as f64 / n as f64 };

    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for class in 0..n_classes {
        let support: usize = confusion[class].iter().sum();
        if support == 0 {
            continue;
        }
        let tp = confusion[class][class] as f64;
        let predicted: usize = (0..n_classes).map(|r| confusion[r][class]).sum();

        let p = if predicted == 0 { 0.0 } else { tp / predicted as f64 };
        let r = tp / support as f64;
        let f = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };

        let weight = support as f64 / n as f64;
        precision += p * weight;
        recall += r * weight;
        f1 += f * weight;
    }

    ClassificationScores {
        accuracy,
        precision,
        recall,
        f1,
        confusion_matrix: confusion,
    }
}

/// Macro-averaged one-vs-rest ROC AUC.
///
/// `proba[i][c]` is the predicted probability of class `c` for sample `i`.
pub(crate) fn roc_auc_ovr(y_true: &[usize], proba: &[Vec<f64>], n_classes: usize) -> Option<f64> {
    let classes: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };

    let mut total = 0.0;
    for &class in &classes {
        let scores: Vec<(f64, bool)> = y_true
            .iter()
            .zip(proba)
            .map(|(&t, p)| (p[class], t == class))
            .collect();
        total += binary_auc(&scores)?;
    }
    Some(total / classes.len() as f64)
}

/// Mann-Whitney AUC with average ranks for ties
fn binary_auc(scores: &[(f64, bool)]) -> Option<f64> {
    let positives = scores.iter().filter(|(_, y)| *y).count();
    let negatives = scores.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut sorted: Vec<(f64, bool)> = scores.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1].0 == sorted[i].0 {
            j += 1;
        }
        // Ranks are 1-based; tied block i..=j shares the mean rank.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += sorted[i..=j].iter().filter(|(_, y)| *y).count() as f64 * avg_rank;
        i = j + 1;
    }

    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let scores = classification_scores(&[0, 1, 1, 2], &[0, 1, 1, 2], 3);
        assert_eq!(scores.accuracy, 1.0);
        assert_eq!(scores.precision, 1.0);
        assert_eq!(scores.recall, 1.0);
        assert_eq!(scores.f1, 1.0);
        assert_eq!(scores.confusion_matrix, vec![vec![1, 0, 0], vec![0, 2, 0], vec![0, 0, 1]]);
    }

    #[test]
    fn test_weighted_scores() {
        // class 0: support 2, one predicted as 1.
        let scores = classification_scores(&[0, 0, 1, 1], &[0, 1, 1, 1], 2);
        assert_eq!(scores.accuracy, 0.75);
        // precision: c0 = 1/1, c1 = 2/3 -> 0.5 * 1 + 0.5 * 2/3
        assert!((scores.precision - (0.5 + 1.0 / 3.0)).abs() < 1e-12);
        // recall: c0 = 1/2, c1 = 1 -> 0.75
        assert!((scores.recall - 0.75).abs() < 1e-12);
        assert_eq!(scores.confusion_matrix, vec![vec![1, 1], vec![0, 2]]);
    }

    #[test]
    fn test_auc_perfect_and_random() {
        let perfect = binary_auc(&[(0.1, false), (0.2, false), (0.8, true), (0.9, true)]).unwrap();
        assert!((perfect - 1.0).abs() < 1e-12);

        let tied = binary_auc(&[(0.5, false), (0.5, true)]).unwrap();
        assert!((tied - 0.5).abs() < 1e-12);

        assert!(binary_auc(&[(0.5, true), (0.7, true)]).is_none());
    }

    #[test]
    fn test_auc_ovr_binary_uses_positive_class() {
        let proba = vec![vec![0.9, 0.1], vec![0.2, 0.8]];
        let auc = roc_auc_ovr(&[0, 1], &proba, 2).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
    }
}
