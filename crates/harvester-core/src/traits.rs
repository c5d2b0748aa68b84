use std::future::Future;

use crate::error::AppError;
use crate::models::{Enrichment, Listing, StoreOutcome};

/// Raw result of a single GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Performs exactly one HTTP GET through the given proxy.
///
/// Non-2xx statuses are returned as responses, not errors; classifying
/// them is the caller's job. No retries happen here.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        url: &str,
        proxy: &str,
    ) -> impl Future<Output = Result<FetchResponse, AppError>> + Send;
}

/// Turns a fetched document into a structured [`Listing`].
pub trait ListingExtractor: Send + Sync + Clone {
    fn extract(
        &self,
        url: &str,
        html: &str,
    ) -> impl Future<Output = Result<Listing, AppError>> + Send;
}

/// Categorical-enrichment service.
///
/// `Ok(None)` means the service did not answer in time; callers carry on
/// without the tag.
pub trait Enricher: Send + Sync + Clone {
    fn enrich(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Option<Enrichment>, AppError>> + Send;
}

/// Converts local-currency (UZS) amounts to whole US dollars.
pub trait CurrencyConverter: Send + Sync + Clone {
    fn uzs_to_usd(&self, amount: i64) -> impl Future<Output = Result<i64, AppError>> + Send;
}

/// Idempotent listing persistence.
pub trait ListingStore: Send + Sync + Clone {
    /// Store the listing unless one with the same source and external id exists.
    fn store_if_absent(
        &self,
        listing: &Listing,
    ) -> impl Future<Output = Result<StoreOutcome, AppError>> + Send;

    /// Whether a listing with this source URL is already stored.
    fn contains_url(&self, url: &str) -> impl Future<Output = Result<bool, AppError>> + Send;
}
