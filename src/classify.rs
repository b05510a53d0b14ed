// src/classify.rs
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::models::{Classification, ClassifiedMatch, MatchScore};

/// The two-threshold policy. Validated on construction so an inverted or
/// out-of-range configuration fails before any scoring begins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub match_threshold: f64,
    pub review_threshold: f64,
}

impl Thresholds {
    pub fn new(match_threshold: f64, review_threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&match_threshold) || !(0.0..=1.0).contains(&review_threshold) {
            return Err(anyhow!(
                "thresholds must lie in [0, 1]: match={}, review={}",
                match_threshold,
                review_threshold
            ));
        }
        if match_threshold <= review_threshold {
            return Err(anyhow!(
                "match_threshold ({}) must be greater than review_threshold ({})",
                match_threshold,
                review_threshold
            ));
        }
        Ok(Self {
            match_threshold,
            review_threshold,
        })
    }

    /// Midpoint of the review band. Active review tasks are ordered by their
    /// probability's distance from this point, most ambiguous first.
    pub fn review_band_midpoint(&self) -> f64 {
        (self.match_threshold + self.review_threshold) / 2.0
    }
}

/// Applies the threshold policy. Both bounds are closed at the lower end:
/// equality at `match_threshold` is an auto-match, equality at
/// `review_threshold` lands in review.
pub fn classify(probability: f64, thresholds: &Thresholds) -> Classification {
    if probability >= thresholds.match_threshold {
        Classification::AutoMatch
    } else if probability >= thresholds.review_threshold {
        Classification::PendingReview
    } else {
        Classification::Rejected
    }
}

/// Classifies a scored pair. Every match score gets exactly one
/// classification, derived deterministically from the active thresholds.
pub fn classify_score(score: &MatchScore, thresholds: &Thresholds) -> ClassifiedMatch {
    ClassifiedMatch {
        pair: score.pair.clone(),
        probability: score.probability,
        classification: classify(score.probability, thresholds),
        features: score.features.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds::new(0.9, 0.7).unwrap()
    }

    #[test]
    fn test_classification_bands() {
        let t = thresholds();
        assert_eq!(classify(0.95, &t), Classification::AutoMatch);
        assert_eq!(classify(0.8, &t), Classification::PendingReview);
        assert_eq!(classify(0.1, &t), Classification::Rejected);
    }

    #[test]
    fn test_exact_boundary_values() {
        let t = thresholds();
        // Closed lower bounds at each threshold.
        assert_eq!(classify(0.9, &t), Classification::AutoMatch);
        assert_eq!(classify(0.7, &t), Classification::PendingReview);
        assert_eq!(
            classify(0.9 - f64::EPSILON * 4.0, &t),
            Classification::PendingReview
        );
        assert_eq!(
            classify(0.7 - f64::EPSILON * 4.0, &t),
            Classification::Rejected
        );
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(Thresholds::new(0.7, 0.7).is_err());
        assert!(Thresholds::new(0.6, 0.9).is_err());
        assert!(Thresholds::new(1.2, 0.7).is_err());
        assert!(Thresholds::new(0.9, -0.1).is_err());
    }

    #[test]
    fn test_review_band_midpoint() {
        let t = thresholds();
        assert!((t.review_band_midpoint() - 0.8).abs() < 1e-12);
    }
}
