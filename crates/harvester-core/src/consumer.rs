//! Queue consumer: claims one delivery at a time and settles it.
//!
//! ```text
//! Delivered | Dropped         -> ack
//! Requeue(any reason)         -> nack, requeue
//! panic while processing      -> Requeue(Unexpected) -> nack, requeue
//! ```
//!
//! Cancellation is only observed between deliveries, so a task in progress
//! is always settled before the loop exits.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::StoreOutcome;
use crate::orchestrator::{DropReason, FetchOrchestrator, FetchOutcome, RequeueReason};
use crate::task::{AckDecision, ConsumerConfig, TaskValidator};
use crate::task_queue::{Delivery, TaskQueue};
use crate::traits::{Fetcher, ListingExtractor, ListingStore};

/// Events emitted by the consumer for monitoring/logging.
#[derive(Debug, Clone)]
pub enum ConsumerEvent<'a> {
    Started {
        consumer_id: &'a str,
        proxies_total: usize,
        proxies_available: usize,
    },
    Polling,
    Received {
        delivery: &'a Delivery,
    },
    Delivered {
        delivery_id: Uuid,
        external_id: &'a str,
        stored: StoreOutcome,
    },
    Dropped {
        delivery_id: Uuid,
        reason: &'a DropReason,
    },
    Requeued {
        delivery_id: Uuid,
        reason: &'a RequeueReason,
    },
    ShuttingDown {
        consumer_id: &'a str,
        released: u64,
    },
    Stopped {
        consumer_id: &'a str,
    },
}

/// Trait for receiving consumer events (decoupled logging).
pub trait ConsumerReporter: Send + Sync {
    fn report(&self, event: ConsumerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsumerReporter;

impl ConsumerReporter for TracingConsumerReporter {
    fn report(&self, event: ConsumerEvent<'_>) {
        match event {
            ConsumerEvent::Started {
                consumer_id,
                proxies_total,
                proxies_available,
            } => {
                tracing::info!(%consumer_id, proxies_total, proxies_available, "Consumer started");
            }
            ConsumerEvent::Polling => {
                tracing::debug!("Polling for tasks");
            }
            ConsumerEvent::Received { delivery } => {
                tracing::info!(
                    delivery_id = %delivery.id,
                    url = %delivery.body,
                    delivery_count = delivery.delivery_count,
                    "Task received"
                );
            }
            ConsumerEvent::Delivered {
                delivery_id,
                external_id,
                stored,
            } => {
                tracing::info!(%delivery_id, %external_id, stored = stored.as_str(), "Task delivered");
            }
            ConsumerEvent::Dropped {
                delivery_id,
                reason,
            } => {
                tracing::warn!(%delivery_id, %reason, "Task dropped");
            }
            ConsumerEvent::Requeued {
                delivery_id,
                reason,
            } => {
                tracing::error!(%delivery_id, %reason, "Task requeued");
            }
            ConsumerEvent::ShuttingDown {
                consumer_id,
                released,
            } => {
                tracing::info!(%consumer_id, released, "Consumer shutting down");
            }
            ConsumerEvent::Stopped { consumer_id } => {
                tracing::info!(%consumer_id, "Consumer stopped");
            }
        }
    }
}

/// Final state of one task, before it is translated into an acknowledgment.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub outcome: FetchOutcome,
    /// Set only when a delivered listing reached the store.
    pub stored: Option<StoreOutcome>,
    pub attempts: usize,
}

impl TaskReport {
    fn without_attempts(outcome: FetchOutcome) -> Self {
        Self {
            outcome,
            stored: None,
            attempts: 0,
        }
    }

    pub fn decision(&self) -> AckDecision {
        match self.outcome {
            FetchOutcome::Delivered(_) | FetchOutcome::Dropped(_) => AckDecision::Ack,
            FetchOutcome::Requeue(_) => AckDecision::Requeue,
        }
    }
}

/// Pulls tasks one at a time, runs them through the orchestrator, stores
/// the result, and acknowledges or requeues the message.
pub struct QueueConsumer<Q, F, E, S>
where
    Q: TaskQueue,
    F: Fetcher,
    E: ListingExtractor,
    S: ListingStore,
{
    queue: Q,
    orchestrator: FetchOrchestrator<F, E>,
    store: S,
    validator: TaskValidator,
    config: ConsumerConfig,
}

impl<Q, F, E, S> QueueConsumer<Q, F, E, S>
where
    Q: TaskQueue,
    F: Fetcher,
    E: ListingExtractor,
    S: ListingStore,
{
    pub fn new(
        queue: Q,
        orchestrator: FetchOrchestrator<F, E>,
        store: S,
        validator: TaskValidator,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            store,
            validator,
            config,
        }
    }

    pub fn consumer_id(&self) -> &str {
        &self.config.consumer_id
    }

    /// Run the consume loop until cancellation.
    ///
    /// A task already in progress when the token fires is finished and
    /// acknowledged first; anything still claimed is released on the way out.
    pub async fn run<CR: ConsumerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &CR,
    ) -> Result<(), AppError> {
        let consumer_id = self.config.consumer_id.as_str();

        // Claims left behind by a previous run under the same id.
        match self.queue.release_consumer(consumer_id).await {
            Ok(0) => {}
            Ok(n) => tracing::warn!(%consumer_id, released = n, "Released stale claims"),
            Err(e) => {
                tracing::error!(%consumer_id, error = %e, kind = e.kind(), "Failed to release stale claims")
            }
        }

        let stats = self.orchestrator.pool().stats();
        reporter.report(ConsumerEvent::Started {
            consumer_id,
            proxies_total: stats.total,
            proxies_available: stats.available,
        });

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            reporter.report(ConsumerEvent::Polling);

            match self.queue.next_delivery(consumer_id).await {
                Ok(Some(delivery)) => {
                    reporter.report(ConsumerEvent::Received {
                        delivery: &delivery,
                    });
                    let report = self.process_delivery(&delivery, reporter).await;
                    self.settle(&delivery, report.decision()).await;

                    if matches!(report.outcome, FetchOutcome::Delivered(_)) {
                        tokio::select! {
                            () = tokio::time::sleep(self.config.effective_pause()) => {}
                            () = cancel_token.cancelled() => break,
                        }
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, kind = e.kind(), "Failed to receive task");
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval * 2) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
            }
        }

        let released = match self.queue.release_consumer(consumer_id).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(%consumer_id, error = %e, kind = e.kind(), "Failed to release claims");
                0
            }
        };

        reporter.report(ConsumerEvent::ShuttingDown {
            consumer_id,
            released,
        });

        let stats = self.orchestrator.pool().stats();
        tracing::info!(
            total = stats.total,
            available = stats.available,
            blocked = stats.blocked,
            "Proxy pool at shutdown"
        );
        for proxy in &stats.proxies {
            tracing::debug!(address = %proxy.address, usage = proxy.usage_count, blocked = proxy.blocked, "Proxy usage");
        }

        reporter.report(ConsumerEvent::Stopped { consumer_id });

        Ok(())
    }

    /// Process one delivery. A panic anywhere inside becomes a requeue.
    pub async fn process_delivery<CR: ConsumerReporter>(
        &self,
        delivery: &Delivery,
        reporter: &CR,
    ) -> TaskReport {
        let report = match AssertUnwindSafe(self.handle(&delivery.body))
            .catch_unwind()
            .await
        {
            Ok(report) => report,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(delivery_id = %delivery.id, %message, "Task processing panicked");
                TaskReport::without_attempts(FetchOutcome::Requeue(RequeueReason::Unexpected(
                    message,
                )))
            }
        };

        match &report.outcome {
            FetchOutcome::Delivered(listing) => reporter.report(ConsumerEvent::Delivered {
                delivery_id: delivery.id,
                external_id: &listing.header.external_id,
                stored: report.stored.unwrap_or(StoreOutcome::Created),
            }),
            FetchOutcome::Dropped(reason) => reporter.report(ConsumerEvent::Dropped {
                delivery_id: delivery.id,
                reason,
            }),
            FetchOutcome::Requeue(reason) => reporter.report(ConsumerEvent::Requeued {
                delivery_id: delivery.id,
                reason,
            }),
        }

        report
    }

    /// Validate, fetch, extract, and store one task body.
    pub async fn handle(&self, body: &str) -> TaskReport {
        let url = match self.validator.validate(body) {
            Ok(url) => url,
            Err(e) => {
                return TaskReport::without_attempts(FetchOutcome::Dropped(
                    DropReason::InvalidTask(e.to_string()),
                ));
            }
        };

        if self.config.skip_known_urls {
            match self.store.contains_url(url.as_str()).await {
                Ok(true) => {
                    return TaskReport::without_attempts(FetchOutcome::Dropped(
                        DropReason::AlreadyStored,
                    ));
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(%url, error = %e, kind = e.kind(), "Known-URL lookup failed, fetching anyway");
                }
            }
        }

        let fetch = self.orchestrator.run(url.as_str()).await;
        let attempts = fetch.attempts.len();

        let FetchOutcome::Delivered(listing) = fetch.outcome else {
            return TaskReport {
                outcome: fetch.outcome,
                stored: None,
                attempts,
            };
        };

        match self.store.store_if_absent(&listing).await {
            Ok(stored) => TaskReport {
                outcome: FetchOutcome::Delivered(listing),
                stored: Some(stored),
                attempts,
            },
            Err(e) => {
                tracing::error!(%url, error = %e, kind = e.kind(), "Failed to store listing");
                TaskReport {
                    outcome: FetchOutcome::Requeue(RequeueReason::PersistenceFailed(e.to_string())),
                    stored: None,
                    attempts,
                }
            }
        }
    }

    async fn settle(&self, delivery: &Delivery, decision: AckDecision) {
        let result = match decision {
            AckDecision::Ack => self.queue.ack(delivery.id).await,
            AckDecision::Requeue => self.queue.nack(delivery.id, true).await,
        };
        if let Err(e) = result {
            tracing::error!(
                delivery_id = %delivery.id,
                decision = decision.as_str(),
                error = %e,
                "Failed to settle delivery"
            );
        }
    }
}
