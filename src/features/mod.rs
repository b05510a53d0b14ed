// src/features/mod.rs
//! Feature comparator: pure, deterministic similarity features between two
//! records under a field-comparison plan. No I/O, no randomness.
pub mod normalize;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strsim::jaro_winkler;

use crate::models::{FeatureValue, FeatureVector, Record};
use normalize::{normalize_email, normalize_string, tokenize};

const FUZZY_WEIGHT: f64 = 0.5;
const TOKEN_WEIGHT: f64 = 0.5;

/// How one field is compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ComparisonMethod {
    /// Byte equality of the raw values.
    Exact,
    /// Equality after normalisation (emails get email-specific handling).
    NormalizedEqual,
    /// Blend of Jaro-Winkler on the normalized strings and token-set overlap.
    TokenSimilarity,
    /// 1.0 at equality, falling linearly to 0.0 at `scale` units apart.
    NumericDistance { scale: f64 },
}

/// One dimension of the comparison plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub field: String,
    #[serde(flatten)]
    pub method: ComparisonMethod,
}

/// Field name -> comparison method. Fields absent from the plan are ignored;
/// fields in the plan but absent from a record yield the `Unknown` sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPlan {
    pub comparisons: Vec<FieldComparison>,
}

impl ComparisonPlan {
    pub fn new(comparisons: Vec<FieldComparison>) -> Self {
        Self { comparisons }
    }

    /// Default plan for organisation/contact records.
    pub fn default_plan() -> Self {
        Self::new(vec![
            FieldComparison {
                field: "name".to_string(),
                method: ComparisonMethod::TokenSimilarity,
            },
            FieldComparison {
                field: "email".to_string(),
                method: ComparisonMethod::NormalizedEqual,
            },
            FieldComparison {
                field: "phone".to_string(),
                method: ComparisonMethod::NormalizedEqual,
            },
            FieldComparison {
                field: "address".to_string(),
                method: ComparisonMethod::TokenSimilarity,
            },
        ])
    }

    /// Fails fast on a malformed plan, before any scoring begins.
    pub fn validate(&self) -> Result<()> {
        if self.comparisons.is_empty() {
            return Err(anyhow!("comparison plan is empty"));
        }
        let mut seen = HashSet::new();
        for comparison in &self.comparisons {
            if comparison.field.trim().is_empty() {
                return Err(anyhow!("comparison plan contains a blank field name"));
            }
            if !seen.insert(comparison.field.as_str()) {
                return Err(anyhow!(
                    "comparison plan names field '{}' more than once",
                    comparison.field
                ));
            }
            if let ComparisonMethod::NumericDistance { scale } = comparison.method {
                if !(scale > 0.0) {
                    return Err(anyhow!(
                        "numeric distance scale for '{}' must be positive, got {}",
                        comparison.field,
                        scale
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Computes the feature vector for a pair of records. Pure function: the same
/// inputs always produce the same vector.
pub fn compare_records(a: &Record, b: &Record, plan: &ComparisonPlan) -> FeatureVector {
    let mut features = FeatureVector::default();
    for comparison in &plan.comparisons {
        let value = match (a.field(&comparison.field), b.field(&comparison.field)) {
            (Some(left), Some(right)) => compare_values(left, right, &comparison.field, &comparison.method),
            _ => FeatureValue::Unknown,
        };
        features.insert(comparison.field.clone(), value);
    }
    features
}

fn compare_values(left: &str, right: &str, field: &str, method: &ComparisonMethod) -> FeatureValue {
    match method {
        ComparisonMethod::Exact => FeatureValue::Score(if left == right { 1.0 } else { 0.0 }),
        ComparisonMethod::NormalizedEqual => {
            let (l, r) = if field.contains("email") {
                (normalize_email(left), normalize_email(right))
            } else {
                (normalize_string(left), normalize_string(right))
            };
            if l.is_empty() || r.is_empty() {
                return FeatureValue::Unknown;
            }
            FeatureValue::Score(if l == r { 1.0 } else { 0.0 })
        }
        ComparisonMethod::TokenSimilarity => FeatureValue::Score(token_similarity(left, right)),
        ComparisonMethod::NumericDistance { scale } => {
            match (parse_numeric(left), parse_numeric(right)) {
                (Some(l), Some(r)) => {
                    let closeness = 1.0 - ((l - r).abs() / scale).min(1.0);
                    FeatureValue::Score(closeness)
                }
                // Unparseable numerics carry no evidence either way.
                _ => FeatureValue::Unknown,
            }
        }
    }
}

/// Blended fuzzy similarity: Jaro-Winkler over the normalized strings plus
/// Jaccard overlap of the stopword-filtered token sets.
pub fn token_similarity(left: &str, right: &str) -> f64 {
    let l_norm = normalize_string(left);
    let r_norm = normalize_string(right);
    if l_norm.is_empty() && r_norm.is_empty() {
        return 0.0;
    }
    let fuzzy = jaro_winkler(&l_norm, &r_norm);

    let l_tokens = tokenize(left);
    let r_tokens = tokenize(right);
    if l_tokens.is_empty() || r_tokens.is_empty() {
        return fuzzy;
    }
    let intersection = l_tokens.intersection(&r_tokens).count() as f64;
    let union = l_tokens.union(&r_tokens).count() as f64;
    let jaccard = intersection / union;

    FUZZY_WEIGHT * fuzzy + TOKEN_WEIGHT * jaccard
}

fn parse_numeric(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, pairs: &[(&str, &str)]) -> Record {
        let mut r = Record::new(id);
        for (k, v) in pairs {
            r = r.with_field(*k, *v);
        }
        r
    }

    #[test]
    fn test_missing_field_yields_unknown_sentinel() {
        let a = record("a", &[("name", "Acme")]);
        let b = record("b", &[("name", "Acme"), ("email", "info@acme.example")]);
        let plan = ComparisonPlan::default_plan();

        let features = compare_records(&a, &b, &plan);
        assert_eq!(features.get("email"), Some(FeatureValue::Unknown));
        assert_eq!(features.get("phone"), Some(FeatureValue::Unknown));
    }

    #[test]
    fn test_near_identical_names_score_high() {
        let sim = token_similarity("Acme Flying School", "ACME Flying School");
        assert!(sim > 0.99, "expected ~1.0, got {}", sim);
    }

    #[test]
    fn test_unrelated_names_score_low() {
        let sim = token_similarity("Acme Flying School", "Summit Aviation");
        assert!(sim < 0.5, "expected low similarity, got {}", sim);
    }

    #[test]
    fn test_normalized_email_equality() {
        let a = record("a", &[("email", "Info@Acme.Example")]);
        let b = record("b", &[("email", "info@acme.example")]);
        let plan = ComparisonPlan::default_plan();

        let features = compare_records(&a, &b, &plan);
        assert_eq!(features.get("email"), Some(FeatureValue::Score(1.0)));
    }

    #[test]
    fn test_numeric_distance() {
        let method = ComparisonMethod::NumericDistance { scale: 10.0 };
        assert_eq!(
            compare_values("5", "5", "age", &method),
            FeatureValue::Score(1.0)
        );
        assert_eq!(
            compare_values("0", "5", "age", &method),
            FeatureValue::Score(0.5)
        );
        assert_eq!(
            compare_values("0", "50", "age", &method),
            FeatureValue::Score(0.0)
        );
        assert_eq!(
            compare_values("five", "5", "age", &method),
            FeatureValue::Unknown
        );
    }

    #[test]
    fn test_plan_validation() {
        assert!(ComparisonPlan::new(vec![]).validate().is_err());

        let duplicated = ComparisonPlan::new(vec![
            FieldComparison {
                field: "name".to_string(),
                method: ComparisonMethod::Exact,
            },
            FieldComparison {
                field: "name".to_string(),
                method: ComparisonMethod::TokenSimilarity,
            },
        ]);
        assert!(duplicated.validate().is_err());

        let bad_scale = ComparisonPlan::new(vec![FieldComparison {
            field: "age".to_string(),
            method: ComparisonMethod::NumericDistance { scale: 0.0 },
        }]);
        assert!(bad_scale.validate().is_err());

        assert!(ComparisonPlan::default_plan().validate().is_ok());
    }

    #[test]
    fn test_comparator_is_deterministic() {
        let a = record("a", &[("name", "Acme Flying School"), ("email", "info@acme.example")]);
        let b = record("b", &[("name", "ACME Flying School"), ("email", "info@acme.example")]);
        let plan = ComparisonPlan::default_plan();

        let first = compare_records(&a, &b, &plan);
        let second = compare_records(&a, &b, &plan);
        assert_eq!(first, second);
    }
}
