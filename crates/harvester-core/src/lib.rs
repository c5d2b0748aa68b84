pub mod config;
pub mod consumer;
pub mod error;
pub mod fetch_pool;
pub mod models;
pub mod orchestrator;
pub mod proxy_pool;
pub mod task;
pub mod task_queue;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{ParserConfig, ProxyConfig};
pub use consumer::{ConsumerEvent, ConsumerReporter, QueueConsumer, TaskReport, TracingConsumerReporter};
pub use error::AppError;
pub use fetch_pool::IsolatedFetcher;
pub use models::{Listing, ListingHeader, PropertyDetails, StoreOutcome, TypeOfProperty, compute_hash};
pub use orchestrator::{FetchOrchestrator, FetchOutcome, OrchestratorConfig};
pub use proxy_pool::ProxyPool;
pub use task::{AckDecision, ConsumerConfig, TaskValidator};
pub use task_queue::{Delivery, TaskQueue};
pub use traits::{CurrencyConverter, Enricher, FetchResponse, Fetcher, ListingExtractor, ListingStore};
