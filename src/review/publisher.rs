// src/review/publisher.rs
//! Narrow outbound contract to the external human-review system: publish a
//! task description, later fetch decision payloads. The core never embeds
//! review-system-specific logic beyond this trait, so any backend (ticketing
//! system, custom queue, or none at all) can satisfy it.
use anyhow::Result;
use futures::future::BoxFuture;
use log::{info, warn};
use std::time::Duration;
use tokio::time::sleep;

use super::queue::ReviewQueueManager;
use crate::models::{ReviewDecision, ReviewTask};

pub trait ReviewGateway: Send + Sync {
    /// Publishes one review task to the external system.
    fn publish_task(&self, task: ReviewTask) -> BoxFuture<'_, Result<()>>;

    /// Fetches decision payloads recorded externally since the last fetch.
    fn fetch_decisions(&self) -> BoxFuture<'_, Result<Vec<ReviewDecision>>>;
}

/// Gateway for deployments without an external review system: decisions are
/// entered directly against the queue instead.
pub struct NullGateway;

impl ReviewGateway for NullGateway {
    fn publish_task(&self, _task: ReviewTask) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn fetch_decisions(&self) -> BoxFuture<'_, Result<Vec<ReviewDecision>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Wraps a gateway with bounded exponential backoff. External calls are
/// retryable and independently cancellable; a persistently unreachable
/// backend surfaces as an error so tasks stay queued locally.
pub struct RetryingGateway<G> {
    inner: G,
    max_attempts: u32,
    base_delay: Duration,
}

impl<G: ReviewGateway> RetryingGateway<G> {
    pub fn new(inner: G, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    async fn with_retries<'a, T, F>(&'a self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> BoxFuture<'a, Result<T>>,
    {
        let mut last_err = None;
        for attempt in 1..=self.max_attempts {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt < self.max_attempts {
                        let delay = self.base_delay * 2u32.pow(attempt - 1);
                        warn!(
                            "Review gateway {} failed (attempt {}/{}): {:#}. Retrying in {:?}",
                            operation, attempt, self.max_attempts, e, delay
                        );
                        sleep(delay).await;
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("gateway {} failed", operation)))
    }
}

impl<G: ReviewGateway> ReviewGateway for RetryingGateway<G> {
    fn publish_task(&self, task: ReviewTask) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.with_retries("publish", || self.inner.publish_task(task.clone()))
                .await
        })
    }

    fn fetch_decisions(&self) -> BoxFuture<'_, Result<Vec<ReviewDecision>>> {
        Box::pin(async move {
            self.with_retries("fetch", || self.inner.fetch_decisions())
                .await
        })
    }
}

/// Publishes all locally queued tasks that have not yet reached the external
/// system. A publication failure leaves the task queued for a later attempt;
/// it never corrupts the queue or the audit log. Returns the backlog size
/// after this pass.
pub async fn publish_pending_tasks(
    gateway: &dyn ReviewGateway,
    queue: &ReviewQueueManager,
) -> usize {
    let pending = queue.unpublished_tasks().await;
    let mut backlog = 0;
    for task in pending {
        let pair = task.pair.clone();
        match gateway.publish_task(task).await {
            Ok(()) => queue.mark_published(&pair).await,
            Err(e) => {
                warn!("Failed to publish review task {}: {:#}", pair, e);
                backlog += 1;
            }
        }
    }
    backlog
}

/// Pulls externally recorded decisions into the queue. A malformed or
/// unreachable backend is reported but the scoring side is unaffected.
pub async fn ingest_external_decisions(
    gateway: &dyn ReviewGateway,
    queue: &ReviewQueueManager,
) -> Result<usize> {
    let decisions = gateway.fetch_decisions().await?;
    let mut recorded = 0;
    for decision in decisions {
        queue.record_decision(decision).await?;
        recorded += 1;
    }
    if recorded > 0 {
        info!("Ingested {} external review decision(s)", recorded);
    }
    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidatePair, FeatureVector, Verdict};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn task(a: &str, b: &str) -> ReviewTask {
        ReviewTask::new(
            CandidatePair::new(a, b).unwrap(),
            0.8,
            FeatureVector::default(),
        )
    }

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyGateway {
        failures: u32,
        calls: AtomicU32,
    }

    impl ReviewGateway for FlakyGateway {
        fn publish_task(&self, _task: ReviewTask) -> BoxFuture<'_, Result<()>> {
            Box::pin(async {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.failures {
                    Err(anyhow::anyhow!("unreachable"))
                } else {
                    Ok(())
                }
            })
        }

        fn fetch_decisions(&self) -> BoxFuture<'_, Result<Vec<ReviewDecision>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    #[tokio::test]
    async fn test_retrying_gateway_recovers_from_transient_failure() {
        let gateway = RetryingGateway::new(
            FlakyGateway {
                failures: 2,
                calls: AtomicU32::new(0),
            },
            3,
            Duration::from_millis(1),
        );
        assert!(gateway.publish_task(task("a", "b")).await.is_ok());
    }

    #[tokio::test]
    async fn test_retrying_gateway_gives_up_after_max_attempts() {
        let gateway = RetryingGateway::new(
            FlakyGateway {
                failures: 10,
                calls: AtomicU32::new(0),
            },
            3,
            Duration::from_millis(1),
        );
        assert!(gateway.publish_task(task("a", "b")).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_publication_keeps_task_queued() {
        let queue = ReviewQueueManager::in_memory();
        queue.enqueue(task("a", "b")).await;

        let broken = FlakyGateway {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let backlog = publish_pending_tasks(&broken, &queue).await;
        assert_eq!(backlog, 1);
        assert_eq!(queue.unpublished_tasks().await.len(), 1);

        // A working gateway later drains the backlog.
        let backlog = publish_pending_tasks(&NullGateway, &queue).await;
        assert_eq!(backlog, 0);
        assert!(queue.unpublished_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_records_fetched_decisions() {
        struct OneDecision;
        impl ReviewGateway for OneDecision {
            fn publish_task(&self, _task: ReviewTask) -> BoxFuture<'_, Result<()>> {
                Box::pin(async { Ok(()) })
            }
            fn fetch_decisions(&self) -> BoxFuture<'_, Result<Vec<ReviewDecision>>> {
                Box::pin(async {
                    Ok(vec![ReviewDecision::new(
                        CandidatePair::new("a", "b").unwrap(),
                        "external-rev",
                        Verdict::Confirm,
                    )])
                })
            }
        }

        let queue = ReviewQueueManager::in_memory();
        queue.enqueue(task("a", "b")).await;

        let recorded = ingest_external_decisions(&OneDecision, &queue).await.unwrap();
        assert_eq!(recorded, 1);
        assert_eq!(queue.open_task_count().await, 0);
        assert_eq!(queue.decision_count().await, 1);
    }
}
