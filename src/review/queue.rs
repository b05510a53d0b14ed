// src/review/queue.rs
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::classify::Thresholds;
use crate::models::{CandidatePair, ReviewDecision, ReviewTask};

/// What happened to a submitted decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// Terminal verdict closed an open task.
    ClosedTask,
    /// Defer on an open task; the task stays in the queue.
    TaskStillOpen,
    /// The decision was appended to the audit log, but no open task existed
    /// for the pair (it was already closed, or never queued). Late decisions
    /// never reopen a task unless explicitly escalated.
    LateLogged,
}

/// Append-only reviewer decision log, optionally durable as a JSON-lines
/// file. The file is the audit trail: never truncated, never rewritten.
struct DecisionLog {
    decisions: Vec<ReviewDecision>,
    file: Option<File>,
    path: Option<PathBuf>,
}

impl DecisionLog {
    fn open(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self {
                decisions: Vec::new(),
                file: None,
                path: None,
            });
        };

        let mut decisions = Vec::new();
        if path.exists() {
            let reader = BufReader::new(
                File::open(path)
                    .with_context(|| format!("failed to open decision log {}", path.display()))?,
            );
            for (line_no, line) in reader.lines().enumerate() {
                let line = line.context("failed to read decision log line")?;
                if line.trim().is_empty() {
                    continue;
                }
                let decision: ReviewDecision = serde_json::from_str(&line).with_context(|| {
                    format!(
                        "corrupt decision log entry at {}:{}",
                        path.display(),
                        line_no + 1
                    )
                })?;
                decisions.push(decision);
            }
            info!(
                "Loaded {} prior review decision(s) from {}",
                decisions.len(),
                path.display()
            );
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open decision log {} for append", path.display()))?;
        Ok(Self {
            decisions,
            file: Some(file),
            path: Some(path.to_path_buf()),
        })
    }

    /// Appends durably before acknowledging. A write failure leaves the
    /// in-memory log untouched and surfaces the error so the sender can
    /// resubmit; silent loss is disallowed.
    fn append(&mut self, decision: ReviewDecision) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            let line = serde_json::to_string(&decision).context("failed to encode decision")?;
            writeln!(file, "{}", line).with_context(|| {
                format!(
                    "failed to append decision to {}; decision was NOT recorded, resubmit it",
                    self.path.as_deref().unwrap_or(Path::new("?")).display()
                )
            })?;
            file.flush().context("failed to flush decision log")?;
        }
        self.decisions.push(decision);
        Ok(())
    }
}

struct QueueInner {
    active: HashMap<CandidatePair, ReviewTask>,
    /// Closed tasks are retained so an explicit escalation can reopen them.
    closed: HashMap<CandidatePair, Option<ReviewTask>>,
    unpublished: HashSet<CandidatePair>,
    log: DecisionLog,
}

/// Maintains pending review tasks and serialises reviewer decisions into the
/// append-only log. Decisions may arrive out of order and from multiple
/// reviewers; the single mutex makes ordering within the log total even
/// though arrival order is not controlled.
pub struct ReviewQueueManager {
    inner: Mutex<QueueInner>,
}

impl ReviewQueueManager {
    /// In-memory queue with no durable log; used in tests and embedded runs.
    pub fn in_memory() -> Self {
        Self::build(DecisionLog {
            decisions: Vec::new(),
            file: None,
            path: None,
        })
    }

    /// Opens the queue with a durable decision log. Prior decisions are
    /// reloaded and pairs with a terminal verdict start out closed, so a
    /// re-run does not resurface already-settled pairs.
    pub fn open(log_path: &Path) -> Result<Self> {
        let log = DecisionLog::open(Some(log_path))?;
        Ok(Self::build(log))
    }

    fn build(log: DecisionLog) -> Self {
        let mut closed: HashMap<CandidatePair, Option<ReviewTask>> = HashMap::new();
        for decision in &log.decisions {
            if decision.verdict.is_terminal() {
                closed.entry(decision.pair.clone()).or_insert(None);
            }
        }
        Self {
            inner: Mutex::new(QueueInner {
                active: HashMap::new(),
                closed,
                unpublished: HashSet::new(),
                log,
            }),
        }
    }

    /// Adds a review task if none exists (open or closed) for the pair.
    /// Returns whether the task was added.
    pub async fn enqueue(&self, task: ReviewTask) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.active.contains_key(&task.pair) || inner.closed.contains_key(&task.pair) {
            debug!("Pair {} already under review or settled; not re-queued", task.pair);
            return false;
        }
        inner.unpublished.insert(task.pair.clone());
        inner.active.insert(task.pair.clone(), task);
        true
    }

    /// Appends a decision to the audit log and, for a terminal verdict,
    /// removes the pair from the active queue. The decision is retained even
    /// when it arrives after the task was already closed.
    pub async fn record_decision(&self, decision: ReviewDecision) -> Result<DecisionOutcome> {
        let mut inner = self.inner.lock().await;
        let pair = decision.pair.clone();
        let terminal = decision.verdict.is_terminal();
        inner.log.append(decision)?;

        if !terminal {
            return Ok(if inner.active.contains_key(&pair) {
                DecisionOutcome::TaskStillOpen
            } else {
                DecisionOutcome::LateLogged
            });
        }

        match inner.active.remove(&pair) {
            Some(task) => {
                inner.unpublished.remove(&pair);
                inner.closed.insert(pair, Some(task));
                Ok(DecisionOutcome::ClosedTask)
            }
            None => {
                // Keep the pair marked settled even if it was never queued
                // here (e.g. a decision recorded against a prior run).
                inner.closed.entry(pair.clone()).or_insert(None);
                warn!("Late decision for {} logged; task not reopened", pair);
                Ok(DecisionOutcome::LateLogged)
            }
        }
    }

    /// Reopens a closed task. Late decisions never do this implicitly; an
    /// operator escalation is the only path back into the queue.
    pub async fn escalate(&self, pair: &CandidatePair) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.closed.remove(pair) {
            Some(Some(task)) => {
                info!("Escalating {} back into the review queue", pair);
                inner.unpublished.insert(pair.clone());
                inner.active.insert(pair.clone(), task);
                true
            }
            Some(None) => {
                // Settled in a prior run; no task object to restore.
                inner.closed.insert(pair.clone(), None);
                false
            }
            None => false,
        }
    }

    /// Currently open tasks, most ambiguous first: ascending distance of the
    /// match probability from the midpoint of the review band.
    pub async fn active_tasks(&self, thresholds: &Thresholds) -> Vec<ReviewTask> {
        let inner = self.inner.lock().await;
        let midpoint = thresholds.review_band_midpoint();
        let mut tasks: Vec<ReviewTask> = inner.active.values().cloned().collect();
        tasks.sort_by(|a, b| {
            let da = (a.probability - midpoint).abs();
            let db = (b.probability - midpoint).abs();
            da.partial_cmp(&db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pair.cmp(&b.pair))
        });
        tasks
    }

    /// Snapshot of every decision ever recorded, in log order.
    pub async fn decisions(&self) -> Vec<ReviewDecision> {
        self.inner.lock().await.log.decisions.clone()
    }

    pub async fn decision_count(&self) -> usize {
        self.inner.lock().await.log.decisions.len()
    }

    /// The authoritative decision per pair for downstream consumption: last
    /// by timestamp, with log order breaking exact-timestamp ties.
    pub async fn latest_decisions(&self) -> HashMap<CandidatePair, ReviewDecision> {
        let inner = self.inner.lock().await;
        let mut latest: HashMap<CandidatePair, ReviewDecision> = HashMap::new();
        for decision in &inner.log.decisions {
            match latest.get(&decision.pair) {
                Some(existing) if existing.decided_at > decision.decided_at => {}
                _ => {
                    latest.insert(decision.pair.clone(), decision.clone());
                }
            }
        }
        latest
    }

    /// Tasks not yet published to the external review interface.
    pub async fn unpublished_tasks(&self) -> Vec<ReviewTask> {
        let inner = self.inner.lock().await;
        let mut tasks: Vec<ReviewTask> = inner
            .unpublished
            .iter()
            .filter_map(|pair| inner.active.get(pair).cloned())
            .collect();
        tasks.sort_by(|a, b| a.pair.cmp(&b.pair));
        tasks
    }

    pub async fn mark_published(&self, pair: &CandidatePair) {
        self.inner.lock().await.unpublished.remove(pair);
    }

    pub async fn open_task_count(&self) -> usize {
        self.inner.lock().await.active.len()
    }
}
