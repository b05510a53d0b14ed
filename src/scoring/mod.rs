// src/scoring/mod.rs
//! Pairwise scoring: converts a feature vector into a match probability.
//!
//! Two implementations share one trait: a rule-based scorer with hand-set
//! weights (zero configuration, used as fallback) and a trained scorer whose
//! per-feature likelihood weights are loaded from a versioned artifact. Both
//! sum per-feature log-likelihood-ratio contributions and map the total
//! through a logistic transform, so probabilities from either path are
//! comparable and thresholds apply uniformly.
pub mod rule_based;
pub mod trained;

use log::warn;
use std::path::Path;
use std::sync::Arc;

use crate::models::{FeatureVector, RunWarning, ScorerVariant};
pub use rule_based::RuleBasedScorer;
pub use trained::{TrainedScorer, TrainedWeightsArtifact};

/// A pairwise scorer. Implementations must be pure: the same feature vector
/// always yields the same probability.
pub trait MatchScorer: Send + Sync {
    /// Probability in [0, 1] that the pair is the same real-world entity.
    fn score(&self, features: &FeatureVector) -> f64;

    fn variant(&self) -> ScorerVariant;
}

pub type SharedScorer = Arc<dyn MatchScorer>;

/// Logistic transform shared by both scorer implementations.
pub(crate) fn sigmoid(logit: f64) -> f64 {
    1.0 / (1.0 + (-logit).exp())
}

/// Loads the trained scorer if an artifact path is given, falling back to the
/// rule-based scorer when the artifact is missing, malformed, or fails its
/// schema check. The fallback covers the entire run: a run never mixes
/// scorer implementations.
pub fn load_scorer(artifact_path: Option<&Path>) -> (SharedScorer, Option<RunWarning>) {
    let Some(path) = artifact_path else {
        return (Arc::new(RuleBasedScorer::default()), None);
    };
    match TrainedScorer::load(path) {
        Ok(scorer) => (Arc::new(scorer), None),
        Err(e) => {
            let reason = format!("{:#}", e);
            warn!(
                "Trained weights artifact at {} unusable ({}). Falling back to rule-based scorer for the entire run.",
                path.display(),
                reason
            );
            (
                Arc::new(RuleBasedScorer::default()),
                Some(RunWarning::ScorerFallback { reason }),
            )
        }
    }
}
