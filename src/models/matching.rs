// src/models/matching.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::core::CandidatePair;

/// One comparison dimension's outcome.
///
/// `Unknown` marks a field missing in one or both records. It is deliberately
/// distinct from `Score(0.0)`: a known non-match carries evidence against the
/// pair, while an unknown carries none, and the scorers treat them differently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureValue {
    Score(f64),
    Unknown,
}

impl FeatureValue {
    pub fn score(&self) -> Option<f64> {
        match self {
            FeatureValue::Score(s) => Some(*s),
            FeatureValue::Unknown => None,
        }
    }
}

/// Named similarity scores, one entry per comparison dimension.
///
/// Backed by a `BTreeMap` so iteration and serialization order are stable,
/// which keeps scoring and artifact output deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: BTreeMap<String, FeatureValue>,
}

impl FeatureVector {
    pub fn insert(&mut self, feature: impl Into<String>, value: FeatureValue) {
        self.values.insert(feature.into(), value);
    }

    pub fn get(&self, feature: &str) -> Option<FeatureValue> {
        self.values.get(feature).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates dimensions with a known score, skipping `Unknown` sentinels.
    pub fn known(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values
            .iter()
            .filter_map(|(name, value)| value.score().map(|s| (name.as_str(), s)))
    }
}

/// A scored candidate pair. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchScore {
    pub pair: CandidatePair,
    pub probability: f64,
    pub features: FeatureVector,
}

/// Outcome of the two-threshold policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    AutoMatch,
    PendingReview,
    Rejected,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::AutoMatch => "auto_match",
            Classification::PendingReview => "pending_review",
            Classification::Rejected => "rejected",
        }
    }
}

/// A match score with its classification, one row in the matches artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedMatch {
    pub pair: CandidatePair,
    pub probability: f64,
    pub classification: Classification,
    pub features: FeatureVector,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_not_zero() {
        let mut features = FeatureVector::default();
        features.insert("name", FeatureValue::Score(0.0));
        features.insert("email", FeatureValue::Unknown);

        assert_eq!(features.get("name"), Some(FeatureValue::Score(0.0)));
        assert_eq!(features.get("email"), Some(FeatureValue::Unknown));
        assert_ne!(features.get("email"), Some(FeatureValue::Score(0.0)));

        let known: Vec<_> = features.known().collect();
        assert_eq!(known, vec![("name", 0.0)]);
    }

    #[test]
    fn test_feature_vector_iteration_order_is_stable() {
        let mut features = FeatureVector::default();
        features.insert("phone", FeatureValue::Score(0.2));
        features.insert("address", FeatureValue::Score(0.9));
        features.insert("name", FeatureValue::Score(0.5));

        let names: Vec<_> = features.values.keys().cloned().collect();
        assert_eq!(names, vec!["address", "name", "phone"]);
    }
}
