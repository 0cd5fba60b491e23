//! Label encoding and multinomial logistic regression

use commentguard_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::features::SparseVector;

/// Maps category labels to dense class indices (sorted label order)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit the encoder on the observed labels
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let classes: BTreeSet<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Encode one label
    pub fn transform(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    /// Encode a batch of labels, failing on unseen ones
    pub fn transform_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|l| {
                self.transform(l.as_ref())
                    .ok_or_else(|| Error::training(format!("unseen label '{}'", l.as_ref())))
            })
            .collect()
    }

    /// Decode a class index
    pub fn inverse(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// Find a class ignoring ASCII case
    pub fn position_ignore_case(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c.eq_ignore_ascii_case(label))
    }

    /// Known classes in index order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Optimiser settings for [`LogisticRegression::fit`]
#[derive(Debug, Clone, Copy)]
pub struct FitParams {
    /// Inverse L2 regularisation strength
    pub c: f64,
    /// Maximum full-batch gradient steps
    pub max_iter: usize,
    /// Step size
    pub learning_rate: f64,
    /// Convergence threshold on the largest gradient component
    pub tolerance: f64,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            learning_rate: 0.5,
            tolerance: 1e-6,
        }
    }
}

/// Softmax (multinomial) logistic regression over sparse features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// `n_classes x n_features` coefficients
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
    n_features: usize,
    /// Iterations used by the last fit
    #[serde(default)]
    n_iter: usize,
}

impl LogisticRegression {
    /// Fit by full-batch gradient descent on the L2-penalised mean
    /// cross-entropy. Deterministic: weights start at zero.
    pub fn fit(
        x: &[SparseVector],
        y: &[usize],
        n_classes: usize,
        n_features: usize,
        params: FitParams,
    ) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::training(format!(
                "{} samples but {} labels",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(Error::training("no training samples"));
        }
        if n_classes < 2 {
            return Err(Error::training(format!(
                "need at least two categories to train, found {}",
                n_classes
            )));
        }
        if params.c <= 0.0 {
            return Err(Error::config("regularisation c must be positive"));
        }
        if let Some(&bad) = y.iter().find(|&&label| label >= n_classes) {
            return Err(Error::training(format!("label index {} out of range", bad)));
        }

        let n = x.len() as f64;
        let penalty = 1.0 / (params.c * n);
        let mut model = Self {
            weights: vec![vec![0.0; n_features]; n_classes],
            intercepts: vec![0.0; n_classes],
            n_features,
            n_iter: 0,
        };

        let mut grad_w = vec![vec![0.0; n_features]; n_classes];
        let mut grad_b = vec![0.0; n_classes];

        for iter in 0..params.max_iter {
            for row in grad_w.iter_mut() {
                row.iter_mut().for_each(|g| *g = 0.0);
            }
            grad_b.iter_mut().for_each(|g| *g = 0.0);

            for (sample, &label) in x.iter().zip(y) {
                let proba = model.predict_proba(sample);
                for (class, p) in proba.iter().enumerate() {
                    let residual = p - if class == label { 1.0 } else { 0.0 };
                    grad_b[class] += residual / n;
                    for &(feature, value) in sample {
                        if feature < n_features {
                            grad_w[class][feature] += residual * value / n;
                        }
                    }
                }
            }

            let mut max_grad: f64 = 0.0;
            for class in 0..n_classes {
                for feature in 0..n_features {
                    let g = grad_w[class][feature] + penalty * model.weights[class][feature];
                    max_grad = max_grad.max(g.abs());
                    model.weights[class][feature] -= params.learning_rate * g;
                }
                max_grad = max_grad.max(grad_b[class].abs());
                model.intercepts[class] -= params.learning_rate * grad_b[class];
            }

            model.n_iter = iter + 1;
            if max_grad < params.tolerance {
                break;
            }
        }

        Ok(model)
    }

    /// Class probabilities for one sample
    pub fn predict_proba(&self, sample: &SparseVector) -> Vec<f64> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| {
                b + sample
                    .iter()
                    .filter(|(feature, _)| *feature < self.n_features)
                    .map(|&(feature, value)| row[feature] * value)
                    .sum::<f64>()
            })
            .collect();
        softmax(&logits)
    }

    /// Most probable class for one sample (lowest index on ties)
    pub fn predict(&self, sample: &SparseVector) -> usize {
        argmax(&self.predict_proba(sample))
    }

    /// Coefficients for one class
    pub fn coefficients(&self, class: usize) -> Option<&[f64]> {
        self.weights.get(class).map(Vec::as_slice)
    }

    pub fn n_classes(&self) -> usize {
        self.weights.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Check internal consistency after deserialising
    pub fn validate(&self) -> Result<()> {
        if self.weights.len() != self.intercepts.len()
            || self.weights.iter().any(|row| row.len() != self.n_features)
        {
            return Err(Error::scorer_unavailable(
                "classifier weights have inconsistent shape",
            ));
        }
        Ok(())
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best, best_v)
            }
        })
        .0
}
