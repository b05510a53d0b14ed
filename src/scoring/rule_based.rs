// src/scoring/rule_based.rs
use std::collections::HashMap;

use super::{sigmoid, MatchScorer};
use crate::models::{FeatureVector, ScorerVariant};

/// Log-likelihood-ratio contribution range for one feature: `agreement_llr`
/// at similarity 1.0, `disagreement_llr` at similarity 0.0, linear in between.
#[derive(Debug, Clone, Copy)]
pub struct FeatureWeight {
    pub agreement_llr: f64,
    pub disagreement_llr: f64,
}

impl FeatureWeight {
    pub fn contribution(&self, similarity: f64) -> f64 {
        let s = similarity.clamp(0.0, 1.0);
        self.disagreement_llr + s * (self.agreement_llr - self.disagreement_llr)
    }
}

/// Deterministic scorer with hand-set weights per feature. Available with
/// zero configuration; the whole-run fallback when no trained artifact loads.
///
/// An `Unknown` feature contributes nothing to the logit, which is how
/// "field missing" stays distinct from "known non-match" (a known
/// disagreement contributes negative evidence).
#[derive(Debug, Clone)]
pub struct RuleBasedScorer {
    weights: HashMap<String, FeatureWeight>,
    default_weight: FeatureWeight,
    prior_logit: f64,
}

impl Default for RuleBasedScorer {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert(
            "email".to_string(),
            FeatureWeight {
                agreement_llr: 5.0,
                disagreement_llr: -1.0,
            },
        );
        weights.insert(
            "phone".to_string(),
            FeatureWeight {
                agreement_llr: 4.5,
                disagreement_llr: -1.5,
            },
        );
        weights.insert(
            "name".to_string(),
            FeatureWeight {
                agreement_llr: 4.0,
                disagreement_llr: -3.0,
            },
        );
        weights.insert(
            "address".to_string(),
            FeatureWeight {
                agreement_llr: 3.0,
                disagreement_llr: -2.0,
            },
        );
        Self {
            weights,
            default_weight: FeatureWeight {
                agreement_llr: 2.0,
                disagreement_llr: -2.0,
            },
            prior_logit: -2.0,
        }
    }
}

impl MatchScorer for RuleBasedScorer {
    fn score(&self, features: &FeatureVector) -> f64 {
        let mut logit = self.prior_logit;
        for (name, similarity) in features.known() {
            let weight = self.weights.get(name).unwrap_or(&self.default_weight);
            logit += weight.contribution(similarity);
        }
        sigmoid(logit)
    }

    fn variant(&self) -> ScorerVariant {
        ScorerVariant::RuleBased
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureValue;

    fn features(pairs: &[(&str, FeatureValue)]) -> FeatureVector {
        let mut f = FeatureVector::default();
        for (name, value) in pairs {
            f.insert(*name, *value);
        }
        f
    }

    #[test]
    fn test_strong_agreement_scores_high() {
        let scorer = RuleBasedScorer::default();
        let p = scorer.score(&features(&[
            ("name", FeatureValue::Score(1.0)),
            ("email", FeatureValue::Score(1.0)),
        ]));
        assert!(p > 0.95, "got {}", p);
    }

    #[test]
    fn test_disagreement_scores_low() {
        let scorer = RuleBasedScorer::default();
        let p = scorer.score(&features(&[
            ("name", FeatureValue::Score(0.1)),
            ("email", FeatureValue::Score(0.0)),
        ]));
        assert!(p < 0.1, "got {}", p);
    }

    #[test]
    fn test_unknown_differs_from_known_disagreement() {
        let scorer = RuleBasedScorer::default();
        let with_unknown = scorer.score(&features(&[
            ("name", FeatureValue::Score(1.0)),
            ("email", FeatureValue::Unknown),
        ]));
        let with_disagreement = scorer.score(&features(&[
            ("name", FeatureValue::Score(1.0)),
            ("email", FeatureValue::Score(0.0)),
        ]));
        assert!(with_unknown > with_disagreement);
    }

    #[test]
    fn test_probability_stays_in_unit_interval() {
        let scorer = RuleBasedScorer::default();
        let all_agree = scorer.score(&features(&[
            ("name", FeatureValue::Score(1.0)),
            ("email", FeatureValue::Score(1.0)),
            ("phone", FeatureValue::Score(1.0)),
            ("address", FeatureValue::Score(1.0)),
        ]));
        let all_disagree = scorer.score(&features(&[
            ("name", FeatureValue::Score(0.0)),
            ("email", FeatureValue::Score(0.0)),
            ("phone", FeatureValue::Score(0.0)),
            ("address", FeatureValue::Score(0.0)),
        ]));
        assert!((0.0..=1.0).contains(&all_agree));
        assert!((0.0..=1.0).contains(&all_disagree));
        assert!(all_agree > all_disagree);
    }

    #[test]
    fn test_unrecognized_feature_uses_default_weight() {
        let scorer = RuleBasedScorer::default();
        let baseline = scorer.score(&FeatureVector::default());
        let with_extra = scorer.score(&features(&[("fax", FeatureValue::Score(1.0))]));
        assert!(with_extra > baseline);
    }
}
