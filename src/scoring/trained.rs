// src/scoring/trained.rs
use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{sigmoid, MatchScorer};
use crate::models::{FeatureVector, ScorerVariant};

/// Schema version this build understands. Bumped when the artifact layout
/// changes incompatibly.
pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;

/// Per-feature Fellegi-Sunter parameters: `m` is the probability the feature
/// agrees given a true match, `u` given a non-match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LikelihoodWeights {
    pub m: f64,
    pub u: f64,
}

impl LikelihoodWeights {
    fn agreement_llr(&self) -> f64 {
        (self.m / self.u).ln()
    }

    fn disagreement_llr(&self) -> f64 {
        ((1.0 - self.m) / (1.0 - self.u)).ln()
    }
}

/// The versioned trained-weights artifact, produced by the offline tuning
/// step that consumes the reviewer decision log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedWeightsArtifact {
    pub schema_version: u32,
    pub model_version: String,
    pub prior_logit: f64,
    pub features: BTreeMap<String, LikelihoodWeights>,
}

impl TrainedWeightsArtifact {
    /// Schema check: a failing artifact is rejected as a whole rather than
    /// partially applied.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema_version {} (supported: {})",
                self.schema_version,
                SUPPORTED_SCHEMA_VERSION
            ));
        }
        if self.features.is_empty() {
            return Err(anyhow!("artifact defines no feature weights"));
        }
        for (name, w) in &self.features {
            if !(0.0 < w.m && w.m < 1.0) || !(0.0 < w.u && w.u < 1.0) {
                return Err(anyhow!(
                    "feature '{}' has m/u outside (0, 1): m={}, u={}",
                    name,
                    w.m,
                    w.u
                ));
            }
            if w.m <= w.u {
                return Err(anyhow!(
                    "feature '{}' has m <= u ({} <= {}), which would invert its evidence",
                    name,
                    w.m,
                    w.u
                ));
            }
        }
        Ok(())
    }
}

/// Scorer backed by a trained-weights artifact. The weights are loaded once
/// at run start and never mutated for the duration of the run.
#[derive(Debug, Clone)]
pub struct TrainedScorer {
    artifact: TrainedWeightsArtifact,
}

impl TrainedScorer {
    pub fn new(artifact: TrainedWeightsArtifact) -> Result<Self> {
        artifact.validate()?;
        Ok(Self { artifact })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read trained weights at {}", path.display()))?;
        let artifact: TrainedWeightsArtifact =
            serde_json::from_str(&raw).context("failed to parse trained weights artifact")?;
        let scorer = Self::new(artifact)?;
        info!(
            "Loaded trained scorer model '{}' with {} feature weights",
            scorer.artifact.model_version,
            scorer.artifact.features.len()
        );
        Ok(scorer)
    }

    pub fn model_version(&self) -> &str {
        &self.artifact.model_version
    }
}

impl MatchScorer for TrainedScorer {
    fn score(&self, features: &FeatureVector) -> f64 {
        let mut logit = self.artifact.prior_logit;
        for (name, similarity) in features.known() {
            // Features the model was not trained on carry no evidence.
            let Some(weights) = self.artifact.features.get(name) else {
                continue;
            };
            let s = similarity.clamp(0.0, 1.0);
            let agree = weights.agreement_llr();
            let disagree = weights.disagreement_llr();
            logit += disagree + s * (agree - disagree);
        }
        sigmoid(logit)
    }

    fn variant(&self) -> ScorerVariant {
        ScorerVariant::Trained {
            model_version: self.artifact.model_version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureValue;
    use std::io::Write;

    fn sample_artifact() -> TrainedWeightsArtifact {
        let mut features = BTreeMap::new();
        features.insert("name".to_string(), LikelihoodWeights { m: 0.95, u: 0.05 });
        features.insert("email".to_string(), LikelihoodWeights { m: 0.9, u: 0.01 });
        TrainedWeightsArtifact {
            schema_version: SUPPORTED_SCHEMA_VERSION,
            model_version: "2026-08-test".to_string(),
            prior_logit: -2.0,
            features,
        }
    }

    #[test]
    fn test_validation_rejects_bad_parameters() {
        let mut artifact = sample_artifact();
        artifact.schema_version = 99;
        assert!(artifact.validate().is_err());

        let mut artifact = sample_artifact();
        artifact
            .features
            .insert("name".to_string(), LikelihoodWeights { m: 0.2, u: 0.8 });
        assert!(artifact.validate().is_err());

        let mut artifact = sample_artifact();
        artifact.features.clear();
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_agreement_raises_probability() {
        let scorer = TrainedScorer::new(sample_artifact()).unwrap();

        let mut agree = FeatureVector::default();
        agree.insert("name", FeatureValue::Score(1.0));
        agree.insert("email", FeatureValue::Score(1.0));

        let mut disagree = FeatureVector::default();
        disagree.insert("name", FeatureValue::Score(0.0));
        disagree.insert("email", FeatureValue::Score(0.0));

        let p_agree = scorer.score(&agree);
        let p_disagree = scorer.score(&disagree);
        assert!(p_agree > 0.9, "got {}", p_agree);
        assert!(p_disagree < 0.1, "got {}", p_disagree);
    }

    #[test]
    fn test_round_trips_through_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string_pretty(&sample_artifact()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let scorer = TrainedScorer::load(file.path()).unwrap();
        assert_eq!(scorer.model_version(), "2026-08-test");
        assert_eq!(
            scorer.variant(),
            ScorerVariant::Trained {
                model_version: "2026-08-test".to_string()
            }
        );
    }

    #[test]
    fn test_untrained_feature_is_ignored() {
        let scorer = TrainedScorer::new(sample_artifact()).unwrap();
        let mut base = FeatureVector::default();
        base.insert("name", FeatureValue::Score(1.0));

        let mut extra = base.clone();
        extra.insert("fax", FeatureValue::Score(1.0));

        assert_eq!(scorer.score(&base), scorer.score(&extra));
    }
}
