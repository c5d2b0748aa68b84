use std::time::Duration;

use harvester_core::error::AppError;
use harvester_core::models::Enrichment;
use harvester_core::traits::Enricher;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Client for the polygon service that tags listing text with a categorical
/// location id.
#[derive(Clone)]
pub struct PolygonClient {
    client: Client,
    url: String,
    timeout_secs: u64,
}

impl PolygonClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, AppError> {
        let url = Url::parse(url)
            .map_err(|e| AppError::ConfigError(format!("Invalid enrichment URL '{url}': {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[derive(Serialize)]
struct PolygonRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct PolygonResponse {
    polygon_id: Option<i64>,
    key: Option<String>,
}

impl Enricher for PolygonClient {
    async fn enrich(&self, text: &str) -> Result<Option<Enrichment>, AppError> {
        let response = match self
            .client
            .post(&self.url)
            .json(&PolygonRequest { text })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                tracing::warn!(url = %self.url, timeout_secs = self.timeout_secs, "Polygon service timed out");
                return Ok(None);
            }
            Err(e) => {
                return Err(AppError::EnrichmentError(format!(
                    "Polygon request failed: {e}"
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::EnrichmentError(format!(
                "Polygon service returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: PolygonResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                tracing::warn!(url = %self.url, timeout_secs = self.timeout_secs, "Polygon service timed out");
                return Ok(None);
            }
            Err(e) => {
                return Err(AppError::EnrichmentError(format!(
                    "Invalid polygon response: {e}"
                )));
            }
        };

        tracing::debug!(polygon_id = ?body.polygon_id, keyword = ?body.key, "Polygon resolved");
        Ok(Some(Enrichment {
            polygon_id: body.polygon_id,
            keyword: body.key,
        }))
    }
}
