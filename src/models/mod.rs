// src/models/mod.rs
pub mod core;
pub mod matching;
pub mod review;
pub mod stats;

pub use self::core::{CandidatePair, Record};
pub use matching::{Classification, ClassifiedMatch, FeatureValue, FeatureVector, MatchScore};
pub use review::{ReviewDecision, ReviewTask, Verdict};
pub use stats::{RunMetadata, RunResult, RunWarning, ScorerVariant};
