// src/coordinator.rs
//! Linkage run coordinator: orchestrates blocking, comparison, scoring, and
//! classification end-to-end, feeds the review queue, and writes artifacts.
use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::artifacts;
use crate::blocking::{self, BlockingConfig};
use crate::classify::{classify_score, Thresholds};
use crate::features::{compare_records, ComparisonPlan};
use crate::models::{
    Classification, ClassifiedMatch, MatchScore, Record, ReviewTask, RunMetadata, RunResult,
    RunWarning,
};
use crate::review::{publish_pending_tasks, ReviewGateway, ReviewQueueManager};
use crate::scoring::SharedScorer;

/// Per-run configuration. Validated up front so a bad configuration fails
/// before any scoring begins.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub thresholds: Thresholds,
    pub blocking: BlockingConfig,
    pub plan: ComparisonPlan,
    /// Artifact directory. `None` disables artifact emission and the
    /// unchanged-input check (useful for embedded/test runs).
    pub artifact_dir: Option<PathBuf>,
    /// Worker-pool width for the per-block scoring pass.
    pub max_concurrent_blocks: usize,
}

impl RunConfig {
    pub fn new(thresholds: Thresholds, blocking: BlockingConfig, plan: ComparisonPlan) -> Self {
        Self {
            thresholds,
            blocking,
            plan,
            artifact_dir: None,
            max_concurrent_blocks: num_cpus::get(),
        }
    }

    pub fn with_artifact_dir(mut self, dir: PathBuf) -> Self {
        self.artifact_dir = Some(dir);
        self
    }
}

pub struct LinkageRunCoordinator {
    config: RunConfig,
}

impl LinkageRunCoordinator {
    /// Fails fast on invalid blocking or comparison configuration. The
    /// thresholds are already validated by construction.
    pub fn new(config: RunConfig) -> Result<Self> {
        config
            .blocking
            .validate()
            .context("invalid blocking configuration")?;
        config
            .plan
            .validate()
            .context("invalid comparison plan")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs one full linkage pass. `scorer_warning` carries a scorer-artifact
    /// fallback, if any, into the run metadata. When a gateway is supplied,
    /// newly queued review tasks are published through it; publication
    /// failures leave tasks queued locally and are reported as a warning.
    pub async fn run(
        &self,
        records: &[Record],
        scorer: SharedScorer,
        scorer_warning: Option<RunWarning>,
        queue: &ReviewQueueManager,
        gateway: Option<&dyn ReviewGateway>,
    ) -> Result<RunResult> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(
            "Starting linkage run {} over {} record(s) with scorer {}",
            run_id,
            records.len(),
            scorer.variant()
        );

        let input_hash = content_hash(records);
        let config_hash = self.config_hash(&scorer);

        // Idempotence: byte-identical input and configuration means the
        // previous artifacts already describe this record set. Re-scoring
        // would only duplicate review tasks for pairs already under review.
        if let Some(dir) = &self.config.artifact_dir {
            if let Some(previous) = artifacts::load_previous_metadata(dir) {
                if previous.input_hash == input_hash && previous.config_hash == config_hash {
                    info!(
                        "Run {} input matches previous run {} (hash {}); skipping scoring",
                        run_id, previous.run_id, input_hash
                    );
                    // A scorer fallback in effect for this invocation still
                    // degrades the rerun, so it stays visible in metadata.
                    let metadata = RunMetadata {
                        run_id,
                        started_at,
                        unchanged: true,
                        warnings: scorer_warning.into_iter().collect(),
                        ..previous
                    };
                    artifacts::write_run_metadata(dir, &metadata)?;
                    return Ok(RunResult {
                        metadata,
                        matches: Vec::new(),
                    });
                }
            }
        }

        let mut warnings = Vec::new();
        if let Some(w) = scorer_warning {
            warnings.push(w);
        }

        // Blocking pass.
        let index = blocking::build_index(records, &self.config.blocking);
        if index.key_error_count > 0 {
            warnings.push(RunWarning::BlockingKeyErrors {
                count: index.key_error_count,
            });
        }
        if !index.unblocked.is_empty() {
            warn!(
                "{} record(s) produced no usable blocking key and will not be scored",
                index.unblocked.len()
            );
            warnings.push(RunWarning::UnblockedRecords {
                count: index.unblocked.len(),
            });
        }
        let pairs_by_block = index.candidate_pairs_by_block();
        info!(
            "Blocking produced {} block(s), {} candidate pair(s), {} unblocked record(s)",
            index.blocks.len(),
            pairs_by_block.iter().map(|(_, p)| p.len()).sum::<usize>(),
            index.unblocked.len()
        );

        // Scoring pass: one task per block on a bounded worker pool. The
        // record map, plan, and scorer are read-only shared state.
        let record_map: Arc<HashMap<String, Record>> = Arc::new(
            records
                .iter()
                .map(|r| (r.id.clone(), r.clone()))
                .collect(),
        );
        let plan = Arc::new(self.config.plan.clone());
        let thresholds = self.config.thresholds;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_blocks.max(1)));

        let mut tasks = Vec::with_capacity(pairs_by_block.len());
        for (_block_key, pairs) in pairs_by_block {
            let record_map = Arc::clone(&record_map);
            let plan = Arc::clone(&plan);
            let scorer = Arc::clone(&scorer);
            let semaphore = Arc::clone(&semaphore);
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("scoring worker pool closed")?;
                let mut scored = Vec::with_capacity(pairs.len());
                for pair in pairs {
                    let (Some(a), Some(b)) = (
                        record_map.get(&pair.record_id_a),
                        record_map.get(&pair.record_id_b),
                    ) else {
                        continue;
                    };
                    let features = compare_records(a, b, &plan);
                    let probability = scorer.score(&features);
                    let score = MatchScore {
                        pair,
                        probability,
                        features,
                    };
                    scored.push(classify_score(&score, &thresholds));
                }
                Ok::<_, anyhow::Error>(scored)
            }));
        }

        let mut matches: Vec<ClassifiedMatch> = Vec::new();
        for join_result in join_all(tasks).await {
            let block_matches = join_result.context("scoring task panicked")??;
            matches.extend(block_matches);
        }
        // Deterministic artifact ordering regardless of task completion order.
        matches.sort_by(|a, b| a.pair.cmp(&b.pair));

        let auto_matches = count(&matches, Classification::AutoMatch);
        let pending_review = count(&matches, Classification::PendingReview);
        let rejected = count(&matches, Classification::Rejected);

        // Queue the ambiguous band for human review.
        let mut newly_queued = 0;
        for m in matches
            .iter()
            .filter(|m| m.classification == Classification::PendingReview)
        {
            let task = ReviewTask::new(m.pair.clone(), m.probability, m.features.clone());
            if queue.enqueue(task).await {
                newly_queued += 1;
            }
        }

        if let Some(gateway) = gateway {
            let backlog = publish_pending_tasks(gateway, queue).await;
            if backlog > 0 {
                warnings.push(RunWarning::ReviewPublishBacklog { pending: backlog });
            }
        }

        let metadata = RunMetadata {
            run_id,
            started_at,
            thresholds,
            scorer_variant: scorer.variant(),
            total_records: records.len(),
            candidate_pairs: matches.len(),
            auto_matches,
            pending_review,
            rejected,
            unblocked_record_ids: index.unblocked.clone(),
            input_hash,
            config_hash,
            unchanged: false,
            warnings,
        };

        if let Some(dir) = &self.config.artifact_dir {
            artifacts::ensure_artifact_dir(dir)?;
            artifacts::write_matches(dir, &matches)?;
            let snapshot = queue.active_tasks(&thresholds).await;
            artifacts::write_review_snapshot(dir, &snapshot)?;
            artifacts::write_run_metadata(dir, &metadata)?;
        }

        let result = RunResult { metadata, matches };
        info!(
            "Linkage run {} finished in {:.2?}: {} pair(s), {} auto-match(es), {} pending ({} newly queued), {} rejected, {} warning(s)",
            result.metadata.run_id,
            start.elapsed(),
            result.metadata.candidate_pairs,
            result.metadata.auto_matches,
            result.metadata.pending_review,
            newly_queued,
            result.metadata.rejected,
            result.metadata.warnings.len()
        );
        for warning in &result.metadata.warnings {
            warn!("Run warning: {}", warning);
        }
        Ok(result)
    }

    fn config_hash(&self, scorer: &SharedScorer) -> String {
        #[derive(Serialize)]
        struct ConfigFingerprint<'a> {
            thresholds: &'a Thresholds,
            blocking: &'a BlockingConfig,
            plan: &'a ComparisonPlan,
            scorer: String,
        }
        let fingerprint = ConfigFingerprint {
            thresholds: &self.config.thresholds,
            blocking: &self.config.blocking,
            plan: &self.config.plan,
            scorer: scorer.variant().to_string(),
        };
        hash_json(&fingerprint)
    }
}

/// Content hash of the input record set: canonical (sorted) field maps keyed
/// by record id, hashed component by component. Field and record ordering in
/// the source file do not affect the hash; any value change does.
pub fn content_hash(records: &[Record]) -> String {
    let canonical: BTreeMap<&str, BTreeMap<&str, &Option<String>>> = records
        .iter()
        .map(|r| {
            let fields: BTreeMap<&str, &Option<String>> = r
                .fields
                .iter()
                .map(|(k, v)| (k.as_str(), v))
                .collect();
            (r.id.as_str(), fields)
        })
        .collect();

    let mut hasher = Sha256::new();
    for (id, fields) in canonical {
        hash_component(&mut hasher, id.as_bytes());
        for (field, value) in fields {
            hash_component(&mut hasher, field.as_bytes());
            match value {
                Some(value) => {
                    hasher.update([1u8]);
                    hash_component(&mut hasher, value.as_bytes());
                }
                None => hasher.update([0u8]),
            }
        }
    }
    hex::encode(hasher.finalize())
}

/// Length-prefixes a component so adjacent components can never blur into the
/// same byte stream (`"ab" + "c"` vs `"a" + "bc"`).
fn hash_component(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn hash_json<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    hex::encode(hasher.finalize())
}

fn count(matches: &[ClassifiedMatch], classification: Classification) -> usize {
    matches
        .iter()
        .filter(|m| m.classification == classification)
        .count()
}
