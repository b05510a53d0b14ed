// src/models/review.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::core::CandidatePair;
use super::matching::FeatureVector;

/// A reviewer's verdict on a pending pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Confirm,
    Reject,
    Defer,
}

impl Verdict {
    /// Terminal verdicts close the review task; `defer` leaves it open.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Verdict::Confirm | Verdict::Reject)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Confirm => "confirm",
            Verdict::Reject => "reject",
            Verdict::Defer => "defer",
        }
    }
}

/// A pending-review pair exposed for human judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewTask {
    pub pair: CandidatePair,
    pub probability: f64,
    pub features: FeatureVector,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl ReviewTask {
    pub fn new(pair: CandidatePair, probability: f64, features: FeatureVector) -> Self {
        Self {
            pair,
            probability,
            features,
            created_at: Utc::now(),
            assigned_to: None,
        }
    }
}

/// One reviewer decision. Append-only: decisions are never mutated or deleted,
/// and multiple decisions may exist for the same pair. The last decision by
/// timestamp is authoritative for downstream consumption; all are retained
/// for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub pair: CandidatePair,
    pub reviewer_id: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub rationale: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl ReviewDecision {
    pub fn new(pair: CandidatePair, reviewer_id: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            pair,
            reviewer_id: reviewer_id.into(),
            verdict,
            rationale: None,
            decided_at: Utc::now(),
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_verdicts() {
        assert!(Verdict::Confirm.is_terminal());
        assert!(Verdict::Reject.is_terminal());
        assert!(!Verdict::Defer.is_terminal());
    }
}
