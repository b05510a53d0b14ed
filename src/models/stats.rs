// src/models/stats.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::matching::ClassifiedMatch;
use crate::classify::Thresholds;

/// Which scorer implementation carried the run. A run uses exactly one
/// scorer end-to-end so all probabilities are comparable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerVariant {
    RuleBased,
    Trained { model_version: String },
}

impl std::fmt::Display for ScorerVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScorerVariant::RuleBased => write!(f, "rule_based"),
            ScorerVariant::Trained { model_version } => write!(f, "trained:{}", model_version),
        }
    }
}

/// A non-fatal degradation observed during a run. Warnings always name the
/// degraded component so operators can decide whether to trust the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "component", rename_all = "snake_case")]
pub enum RunWarning {
    ScorerFallback { reason: String },
    UnblockedRecords { count: usize },
    BlockingKeyErrors { count: usize },
    ReviewPublishBacklog { pending: usize },
}

impl std::fmt::Display for RunWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunWarning::ScorerFallback { reason } => {
                write!(f, "scorer fell back to rule-based: {}", reason)
            }
            RunWarning::UnblockedRecords { count } => {
                write!(f, "{} record(s) produced no usable blocking key", count)
            }
            RunWarning::BlockingKeyErrors { count } => {
                write!(f, "{} record(s) failed key derivation and were unblocked", count)
            }
            RunWarning::ReviewPublishBacklog { pending } => {
                write!(f, "{} review task(s) awaiting publication", pending)
            }
        }
    }
}

/// Run metadata artifact: thresholds used, scorer variant, counts, input
/// content hash, timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub thresholds: Thresholds,
    pub scorer_variant: ScorerVariant,
    pub total_records: usize,
    pub candidate_pairs: usize,
    pub auto_matches: usize,
    pub pending_review: usize,
    pub rejected: usize,
    /// Records reported but not scored (no usable blocking key).
    pub unblocked_record_ids: Vec<String>,
    pub input_hash: String,
    pub config_hash: String,
    /// True when the previous run had identical input and configuration and
    /// scoring was skipped.
    pub unchanged: bool,
    pub warnings: Vec<RunWarning>,
}

/// Structured result of one coordinator invocation.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub metadata: RunMetadata,
    pub matches: Vec<ClassifiedMatch>,
}

impl RunResult {
    pub fn has_warnings(&self) -> bool {
        !self.metadata.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.metadata.unchanged {
            return format!(
                "run {} detected unchanged input (hash {}); scoring skipped",
                self.metadata.run_id, self.metadata.input_hash
            );
        }
        format!(
            "run {} succeeded with {} warning(s): {} records, {} pairs, {} auto-matches, {} pending review, {} rejected",
            self.metadata.run_id,
            self.metadata.warnings.len(),
            self.metadata.total_records,
            self.metadata.candidate_pairs,
            self.metadata.auto_matches,
            self.metadata.pending_review,
            self.metadata.rejected,
        )
    }
}
