// src/artifacts.rs
//! File artifacts consumed by downstream reporting and audit tooling:
//! scored matches (JSONL), the review-queue snapshot (JSONL), and run
//! metadata (JSON). The reviewer decision log is owned by the queue manager.
use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::{ClassifiedMatch, ReviewTask, RunMetadata};

pub const MATCHES_FILE: &str = "matches.jsonl";
pub const REVIEW_SNAPSHOT_FILE: &str = "review_queue.jsonl";
pub const RUN_METADATA_FILE: &str = "run_metadata.json";
pub const DECISION_LOG_FILE: &str = "decisions.jsonl";

/// Writes rows as JSON lines via a temp file + rename, so an interrupted run
/// leaves the previous artifact untouched rather than half-written.
fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            let line = serde_json::to_string(row).context("failed to encode artifact row")?;
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to move artifact into place at {}", path.display()))?;
    Ok(())
}

pub fn write_matches(dir: &Path, matches: &[ClassifiedMatch]) -> Result<()> {
    let path = dir.join(MATCHES_FILE);
    write_jsonl(&path, matches)?;
    debug!("Wrote {} match row(s) to {}", matches.len(), path.display());
    Ok(())
}

pub fn write_review_snapshot(dir: &Path, tasks: &[ReviewTask]) -> Result<()> {
    let path = dir.join(REVIEW_SNAPSHOT_FILE);
    write_jsonl(&path, tasks)?;
    debug!(
        "Wrote review snapshot with {} open task(s) to {}",
        tasks.len(),
        path.display()
    );
    Ok(())
}

pub fn write_run_metadata(dir: &Path, metadata: &RunMetadata) -> Result<()> {
    let path = dir.join(RUN_METADATA_FILE);
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(metadata).context("failed to encode run metadata")?;
    fs::write(&tmp_path, json)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &path)
        .with_context(|| format!("failed to move metadata into place at {}", path.display()))?;
    info!("Wrote run metadata to {}", path.display());
    Ok(())
}

/// Loads the previous run's metadata, if any. Drives the unchanged-input
/// check; a missing or unreadable file simply means "no previous run".
pub fn load_previous_metadata(dir: &Path) -> Option<RunMetadata> {
    let path = dir.join(RUN_METADATA_FILE);
    let raw = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            debug!(
                "Previous run metadata at {} unreadable ({}); treating as no prior run",
                path.display(),
                e
            );
            None
        }
    }
}

pub fn ensure_artifact_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Thresholds;
    use crate::models::stats::ScorerVariant;
    use crate::models::{CandidatePair, Classification, FeatureVector};
    use chrono::Utc;

    fn sample_metadata() -> RunMetadata {
        RunMetadata {
            run_id: "run-1".to_string(),
            started_at: Utc::now(),
            thresholds: Thresholds::new(0.9, 0.7).unwrap(),
            scorer_variant: ScorerVariant::RuleBased,
            total_records: 2,
            candidate_pairs: 1,
            auto_matches: 1,
            pending_review: 0,
            rejected: 0,
            unblocked_record_ids: vec![],
            input_hash: "abc".to_string(),
            config_hash: "def".to_string(),
            unchanged: false,
            warnings: vec![],
        }
    }

    #[test]
    fn test_metadata_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = sample_metadata();
        write_run_metadata(dir.path(), &metadata).unwrap();

        let loaded = load_previous_metadata(dir.path()).unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.input_hash, "abc");
        assert_eq!(loaded.config_hash, "def");
    }

    #[test]
    fn test_missing_metadata_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_previous_metadata(dir.path()).is_none());
    }

    #[test]
    fn test_matches_written_one_row_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let matches = vec![
            ClassifiedMatch {
                pair: CandidatePair::new("a", "b").unwrap(),
                probability: 0.95,
                classification: Classification::AutoMatch,
                features: FeatureVector::default(),
            },
            ClassifiedMatch {
                pair: CandidatePair::new("c", "d").unwrap(),
                probability: 0.2,
                classification: Classification::Rejected,
                features: FeatureVector::default(),
            },
        ];
        write_matches(dir.path(), &matches).unwrap();

        let raw = fs::read_to_string(dir.path().join(MATCHES_FILE)).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.lines().next().unwrap().contains("AutoMatch"));
    }
}
