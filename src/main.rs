// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use linkage_lib::artifacts::DECISION_LOG_FILE;
use linkage_lib::blocking::BlockingConfig;
use linkage_lib::classify::Thresholds;
use linkage_lib::coordinator::{LinkageRunCoordinator, RunConfig};
use linkage_lib::features::ComparisonPlan;
use linkage_lib::models::Record;
use linkage_lib::review::ReviewQueueManager;
use linkage_lib::scoring::load_scorer;
use log::info;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "linkage",
    about = "Resolve duplicate entities across merged data sources"
)]
struct Args {
    /// JSON file with the input records (array of {id, fields}).
    #[arg(long)]
    records: PathBuf,

    /// Directory for run artifacts (matches, review snapshot, metadata,
    /// decision log).
    #[arg(long, default_value = "linkage_artifacts")]
    artifact_dir: PathBuf,

    /// Probability at or above which a pair auto-matches.
    #[arg(long, default_value_t = 0.9)]
    match_threshold: f64,

    /// Probability at or above which a pair is routed to human review.
    #[arg(long, default_value_t = 0.7)]
    review_threshold: f64,

    /// Optional trained-weights artifact. Falls back to the rule-based
    /// scorer when missing or malformed.
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Optional comparison-plan JSON; defaults to the built-in plan.
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Optional blocking-config JSON; defaults to the built-in strategies.
    #[arg(long)]
    blocking: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    dotenv::dotenv().ok();
    let args = Args::parse();
    let start = Instant::now();
    info!("Starting entity linkage run");

    let thresholds = Thresholds::new(args.match_threshold, args.review_threshold)
        .context("invalid threshold configuration")?;

    let plan = match &args.plan {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read comparison plan {}", path.display()))?;
            serde_json::from_str::<ComparisonPlan>(&raw).context("malformed comparison plan")?
        }
        None => ComparisonPlan::default_plan(),
    };

    let blocking = match &args.blocking {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read blocking config {}", path.display()))?;
            serde_json::from_str::<BlockingConfig>(&raw).context("malformed blocking config")?
        }
        None => BlockingConfig::default_config(),
    };

    let raw_records = fs::read_to_string(&args.records)
        .with_context(|| format!("failed to read records file {}", args.records.display()))?;
    let records: Vec<Record> =
        serde_json::from_str(&raw_records).context("malformed records file")?;
    info!(
        "Loaded {} record(s) from {}",
        records.len(),
        args.records.display()
    );

    let (scorer, scorer_warning) = load_scorer(args.weights.as_deref());

    let config = RunConfig::new(thresholds, blocking, plan)
        .with_artifact_dir(args.artifact_dir.clone());
    let coordinator = LinkageRunCoordinator::new(config)?;

    linkage_lib::artifacts::ensure_artifact_dir(&args.artifact_dir)?;
    let queue = ReviewQueueManager::open(&args.artifact_dir.join(DECISION_LOG_FILE))?;

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    progress.set_message("Scoring candidate pairs...");
    progress.enable_steady_tick(std::time::Duration::from_millis(120));

    let result = coordinator
        .run(&records, scorer, scorer_warning, &queue, None)
        .await?;

    progress.finish_with_message("Linkage pass complete");

    info!("=== Run Summary ===");
    info!("Run ID: {}", result.metadata.run_id);
    info!("Scorer: {}", result.metadata.scorer_variant);
    if result.metadata.unchanged {
        info!("Input unchanged since previous run; scoring skipped");
    } else {
        info!("Records: {}", result.metadata.total_records);
        info!("Candidate pairs: {}", result.metadata.candidate_pairs);
        info!("Auto-matches: {}", result.metadata.auto_matches);
        info!("Pending review: {}", result.metadata.pending_review);
        info!("Rejected: {}", result.metadata.rejected);
        info!(
            "Unblocked records: {}",
            result.metadata.unblocked_record_ids.len()
        );
    }
    for warning in &result.metadata.warnings {
        info!("Warning: {}", warning);
    }
    info!("Open review tasks: {}", queue.open_task_count().await);
    info!("Decision log length: {}", queue.decision_count().await);
    info!("Total execution time: {:.2?}", start.elapsed());
    println!("{}", result.summary());

    Ok(())
}
