// src/review/mod.rs
pub mod publisher;
pub mod queue;

pub use publisher::{
    ingest_external_decisions, publish_pending_tasks, NullGateway, RetryingGateway, ReviewGateway,
};
pub use queue::{DecisionOutcome, ReviewQueueManager};
