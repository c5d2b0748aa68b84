//! Per-task retry state machine over the proxy pool.
//!
//! ```text
//! SELECT_PROXY -> FETCHING -> CLASSIFY -+-> SUCCESS    Delivered(listing)
//!      ^                                +-> RETRY ----+  (403, other status, transport failure)
//!      +--------------------------------------------- +
//!                                       +-> DROPPED    Dropped(NotFound)       (404, 410)
//!                                       +-> FATAL      Requeue(PoolExhausted | ExtractionFailed)
//!                                       +-> EXHAUSTED  Requeue(RetriesExhausted)
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::Listing;
use crate::proxy_pool::ProxyPool;
use crate::traits::{Fetcher, ListingExtractor};

/// How an HTTP status steers the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 200: hand the document to the extractor.
    Success,
    /// 403: the origin is refusing this proxy.
    ProxyRefused,
    /// 404/410: the listing is gone for good.
    Gone,
    /// Anything else: maybe proxy-specific, try another one.
    Retryable,
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200 => StatusClass::Success,
        403 => StatusClass::ProxyRefused,
        404 | 410 => StatusClass::Gone,
        _ => StatusClass::Retryable,
    }
}

/// Why a task was removed from the queue without success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Body is not an allowed URL.
    InvalidTask(String),
    /// Origin answered 404 or 410.
    NotFound { status: u16 },
    /// A listing with this URL is already stored.
    AlreadyStored,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::InvalidTask(msg) => write!(f, "invalid task: {msg}"),
            DropReason::NotFound { status } => write!(f, "resource gone (HTTP {status})"),
            DropReason::AlreadyStored => write!(f, "already stored"),
        }
    }
}

/// Why a task goes back to the queue for redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequeueReason {
    PoolExhausted,
    ExtractionFailed { kind: &'static str, message: String },
    RetriesExhausted { attempts: u32 },
    PersistenceFailed(String),
    Unexpected(String),
}

impl fmt::Display for RequeueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequeueReason::PoolExhausted => write!(f, "proxy pool exhausted"),
            RequeueReason::ExtractionFailed { kind, message } => {
                write!(f, "extraction failed ({kind}): {message}")
            }
            RequeueReason::RetriesExhausted { attempts } => {
                write!(f, "retries exhausted after {attempts} attempts")
            }
            RequeueReason::PersistenceFailed(msg) => write!(f, "persistence failed: {msg}"),
            RequeueReason::Unexpected(msg) => write!(f, "unexpected failure: {msg}"),
        }
    }
}

/// Terminal result of processing one task.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Delivered(Box<Listing>),
    Dropped(DropReason),
    Requeue(RequeueReason),
}

/// What happened on one pass through the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Status(u16),
    Failed { kind: &'static str, message: String },
}

/// One retry iteration. Lives only as long as the task's report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub attempt: u32,
    pub proxy: String,
    pub result: AttemptResult,
}

/// Outcome plus the attempts that led to it.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub outcome: FetchOutcome,
    pub attempts: Vec<FetchAttempt>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_retries: u32,
    pub block_on_forbidden: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            block_on_forbidden: false,
        }
    }
}

/// Drives proxy selection, fetching, and extraction for one URL at a time.
pub struct FetchOrchestrator<F, E>
where
    F: Fetcher,
    E: ListingExtractor,
{
    pool: Arc<ProxyPool>,
    fetcher: F,
    extractor: E,
    config: OrchestratorConfig,
}

impl<F, E> FetchOrchestrator<F, E>
where
    F: Fetcher,
    E: ListingExtractor,
{
    pub fn new(pool: Arc<ProxyPool>, fetcher: F, extractor: E, config: OrchestratorConfig) -> Self {
        Self {
            pool,
            fetcher,
            extractor,
            config,
        }
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    /// `min(max_retries, unblocked proxies)`, recomputed for every task.
    pub fn retry_budget(&self) -> u32 {
        let unblocked = u32::try_from(self.pool.unblocked_count()).unwrap_or(u32::MAX);
        self.config.max_retries.min(unblocked)
    }

    /// Run the retry loop for an already validated URL.
    pub async fn run(&self, url: &str) -> FetchReport {
        let budget = self.retry_budget();
        // With nothing unblocked the first selection fails and reports the exhausted pool.
        let max_attempts = budget.max(1);
        let mut attempts = Vec::new();

        for attempt in 1..=max_attempts {
            let proxy = match self.pool.select() {
                Ok(proxy) => proxy,
                Err(e) => {
                    tracing::error!(%url, attempt, error = %e, kind = e.kind(), "Cannot select a proxy");
                    return FetchReport {
                        outcome: FetchOutcome::Requeue(RequeueReason::PoolExhausted),
                        attempts,
                    };
                }
            };

            tracing::info!(%url, %proxy, attempt, budget, "Fetching through proxy");

            let response = match self.fetcher.fetch(url, &proxy).await {
                Ok(response) => response,
                Err(e) => {
                    if e.is_proxy_rotatable() {
                        tracing::warn!(%url, %proxy, attempt, error = %e, kind = e.kind(), "Fetch failed, rotating proxy");
                    } else {
                        tracing::warn!(%url, %proxy, attempt, error = %e, kind = e.kind(), "Unexpected fetch failure, rotating proxy");
                    }
                    attempts.push(FetchAttempt {
                        attempt,
                        proxy,
                        result: AttemptResult::Failed {
                            kind: e.kind(),
                            message: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            let status = response.status;
            attempts.push(FetchAttempt {
                attempt,
                proxy: proxy.clone(),
                result: AttemptResult::Status(status),
            });

            match classify_status(status) {
                StatusClass::Success => {
                    tracing::info!(%url, %proxy, bytes = response.body.len(), "Fetched page");
                    let outcome = self.extract(url, &response.body).await;
                    return FetchReport { outcome, attempts };
                }
                StatusClass::Gone => {
                    tracing::info!(%url, status, "Listing is gone, dropping task");
                    return FetchReport {
                        outcome: FetchOutcome::Dropped(DropReason::NotFound { status }),
                        attempts,
                    };
                }
                StatusClass::ProxyRefused => {
                    tracing::warn!(%url, %proxy, status, "Proxy refused by origin, trying the next one");
                    if self.config.block_on_forbidden {
                        self.pool.block(&proxy);
                    }
                }
                StatusClass::Retryable => {
                    tracing::warn!(%url, %proxy, status, "Unexpected status, trying the next proxy");
                }
            }
        }

        tracing::error!(%url, attempts = attempts.len(), "Could not process URL within the retry budget");
        FetchReport {
            outcome: FetchOutcome::Requeue(RequeueReason::RetriesExhausted {
                attempts: attempts.len() as u32,
            }),
            attempts,
        }
    }

    /// Extraction failures never rotate the proxy: the content is at fault.
    async fn extract(&self, url: &str, html: &str) -> FetchOutcome {
        match self.extractor.extract(url, html).await {
            Ok(listing) => {
                tracing::info!(
                    %url,
                    external_id = %listing.header.external_id,
                    property = %listing.header.type_of_property,
                    "Listing extracted"
                );
                FetchOutcome::Delivered(Box::new(listing))
            }
            Err(e) => {
                if e.is_content_error() {
                    tracing::error!(%url, error = %e, kind = e.kind(), "Page structure not recognized");
                } else {
                    tracing::error!(%url, error = %e, kind = e.kind(), "Extraction dependency failed");
                }
                FetchOutcome::Requeue(RequeueReason::ExtractionFailed {
                    kind: e.kind(),
                    message: e.to_string(),
                })
            }
        }
    }
}
