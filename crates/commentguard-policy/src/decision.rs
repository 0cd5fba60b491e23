//! Probability-to-decision policy

use commentguard_core::{Error, ModerationStatus, Result};
use serde::{Deserialize, Serialize};

/// Default lower bound of the review band (inclusive)
pub const DEFAULT_REVIEW_THRESHOLD: f32 = 0.30;

/// Default lower bound of the toxic band (inclusive)
pub const DEFAULT_TOXIC_THRESHOLD: f32 = 0.45;

/// Outcome of the decision policy for one probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Neutral,
    Review,
    Toxic,
}

impl Decision {
    /// Status the decision maps to before any remote action
    pub fn status(&self) -> ModerationStatus {
        match self {
            Self::Neutral => ModerationStatus::Neutral,
            Self::Review => ModerationStatus::Review,
            Self::Toxic => ModerationStatus::Toxic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.status().as_str()
    }
}

/// Decision band boundaries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Probabilities at or above this are at least `review`
    #[serde(default = "default_review")]
    pub review: f32,

    /// Probabilities at or above this are `toxic`
    #[serde(default = "default_toxic")]
    pub toxic: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            review: DEFAULT_REVIEW_THRESHOLD,
            toxic: DEFAULT_TOXIC_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Check that both bounds are probabilities and correctly ordered
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f32| (0.0..=1.0).contains(&v);
        if !in_range(self.review) || !in_range(self.toxic) {
            return Err(Error::config(format!(
                "thresholds must lie in [0, 1], got review={} toxic={}",
                self.review, self.toxic
            )));
        }
        if self.review > self.toxic {
            return Err(Error::config(format!(
                "review threshold {} exceeds toxic threshold {}",
                self.review, self.toxic
            )));
        }
        Ok(())
    }
}

fn default_review() -> f32 {
    DEFAULT_REVIEW_THRESHOLD
}

fn default_toxic() -> f32 {
    DEFAULT_TOXIC_THRESHOLD
}

/// Pure mapping from toxicity probability to decision
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionPolicy {
    thresholds: Thresholds,
}

impl DecisionPolicy {
    /// Create a policy with validated thresholds
    pub fn new(thresholds: Thresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    /// Get the active thresholds
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Decide for one probability.
    ///
    /// Both boundaries are inclusive: a probability equal to the toxic bound
    /// is `toxic`, one equal to the review bound is `review`. A NaN score
    /// goes to `review` so that it is never silently accepted.
    pub fn decide(&self, probability: f32) -> Decision {
        if probability.is_nan() {
            return Decision::Review;
        }
        if probability >= self.thresholds.toxic {
            Decision::Toxic
        } else if probability >= self.thresholds.review {
            Decision::Review
        } else {
            Decision::Neutral
        }
    }
}

/// Decide with the default thresholds
pub fn decide(probability: f32) -> Decision {
    DecisionPolicy::default().decide(probability)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(decide(0.45), Decision::Toxic);
        assert_eq!(decide(0.450000001), Decision::Toxic);
        assert_eq!(decide(0.5), Decision::Toxic);
        assert_eq!(decide(0.449), Decision::Review);
        assert_eq!(decide(0.35), Decision::Review);
        assert_eq!(decide(0.3), Decision::Review);
        assert_eq!(decide(0.2999), Decision::Neutral);
        assert_eq!(decide(0.0), Decision::Neutral);
        assert_eq!(decide(1.0), Decision::Toxic);
    }

    #[test]
    fn test_nan_goes_to_review() {
        assert_eq!(decide(f32::NAN), Decision::Review);
    }

    #[test]
    fn test_custom_thresholds() {
        let policy = DecisionPolicy::new(Thresholds {
            review: 0.5,
            toxic: 0.9,
        })
        .unwrap();

        assert_eq!(policy.decide(0.45), Decision::Neutral);
        assert_eq!(policy.decide(0.5), Decision::Review);
        assert_eq!(policy.decide(0.9), Decision::Toxic);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(DecisionPolicy::new(Thresholds {
            review: 0.6,
            toxic: 0.4
        })
        .is_err());
        assert!(DecisionPolicy::new(Thresholds {
            review: -0.1,
            toxic: 0.4
        })
        .is_err());
    }

    #[test]
    fn test_decision_status_mapping() {
        assert_eq!(Decision::Toxic.status(), ModerationStatus::Toxic);
        assert_eq!(Decision::Review.as_str(), "review");
    }

    fn rank(d: Decision) -> u8 {
        match d {
            Decision::Neutral => 0,
            Decision::Review => 1,
            Decision::Toxic => 2,
        }
    }

    proptest! {
        #[test]
        fn prop_decide_is_deterministic(p in any::<f32>()) {
            prop_assert_eq!(decide(p), decide(p));
        }

        #[test]
        fn prop_decide_is_monotonic(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rank(decide(lo)) <= rank(decide(hi)));
        }

        #[test]
        fn prop_bands_match_thresholds(p in 0.0f32..=1.0) {
            let expected = if p >= DEFAULT_TOXIC_THRESHOLD {
                Decision::Toxic
            } else if p >= DEFAULT_REVIEW_THRESHOLD {
                Decision::Review
            } else {
                Decision::Neutral
            };
            prop_assert_eq!(decide(p), expected);
        }
    }
}
