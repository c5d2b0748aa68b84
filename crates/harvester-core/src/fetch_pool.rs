//! Runs fetches on spawned worker tasks so a hung proxy never stalls the caller.
//!
//! Wraps any [`Fetcher`]. Each call is submitted to its own Tokio task,
//! gated by a semaphore that caps how many fetches run at once, and
//! bounded by a hard timeout. The caller awaits the task's result; the
//! worker's resources are released when the task ends, on every path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::AppError;
use crate::traits::{FetchResponse, Fetcher};

#[derive(Clone)]
pub struct IsolatedFetcher<F> {
    inner: F,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl<F> IsolatedFetcher<F>
where
    F: Fetcher + 'static,
{
    pub fn new(inner: F, max_in_flight: usize, timeout: Duration) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            timeout,
        }
    }

    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}

impl<F> Fetcher for IsolatedFetcher<F>
where
    F: Fetcher + 'static,
{
    async fn fetch(&self, url: &str, proxy: &str) -> Result<FetchResponse, AppError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Generic(format!("Fetch pool closed: {e}")))?;

        let inner = self.inner.clone();
        let url = url.to_string();
        let proxy = proxy.to_string();
        let timeout = self.timeout;

        let handle = tokio::spawn(async move {
            let _permit = permit;
            tokio::time::timeout(timeout, inner.fetch(&url, &proxy)).await
        });

        match handle.await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(AppError::Timeout(timeout.as_secs())),
            Err(join_err) if join_err.is_panic() => {
                Err(AppError::Generic("Fetch worker panicked".into()))
            }
            Err(join_err) => Err(AppError::Generic(format!(
                "Fetch worker cancelled: {join_err}"
            ))),
        }
    }
}
