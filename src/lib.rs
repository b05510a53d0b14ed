// src/lib.rs
//! Entity linkage engine: resolves duplicate real-world entities across
//! merged data sources. Generates candidate pairs via blocking, scores them
//! with explainable feature comparisons, classifies against a two-threshold
//! policy, and routes the ambiguous band through a human review queue with
//! an append-only decision log.
pub mod artifacts;
pub mod blocking;
pub mod classify;
pub mod coordinator;
pub mod features;
pub mod models;
pub mod review;
pub mod scoring;

pub use classify::Thresholds;
pub use coordinator::{LinkageRunCoordinator, RunConfig};
pub use review::ReviewQueueManager;
