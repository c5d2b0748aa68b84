use std::time::Duration;

use harvester_core::error::AppError;
use harvester_core::traits::CurrencyConverter;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://open.er-api.com/v6";
const RATE_TTL: Duration = Duration::from_secs(3600);
const RATE_KEY: &str = "USD/UZS";

/// UZS to USD conversion backed by the open exchange-rate API.
///
/// The USD→UZS rate is cached for an hour; concurrent misses share one request.
#[derive(Clone)]
pub struct ErApiConverter {
    client: Client,
    base_url: String,
    rates: Cache<&'static str, f64>,
}

impl ErApiConverter {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rates: Cache::builder()
                .max_capacity(1)
                .time_to_live(RATE_TTL)
                .build(),
        })
    }

    async fn fetch_rate(&self) -> Result<f64, AppError> {
        let url = format!("{}/latest/USD", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::CurrencyError(format!("Rate request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::CurrencyError(format!(
                "Failed to convert currency: HTTP {}",
                status.as_u16()
            )));
        }

        let body: RatesResponse = response
            .json()
            .await
            .map_err(|e| AppError::CurrencyError(format!("Invalid rates response: {e}")))?;

        let rate = body
            .rates
            .and_then(|r| r.uzs)
            .filter(|r| *r > 0.0)
            .ok_or_else(|| {
                AppError::CurrencyError("Invalid response from currency API: missing UZS rate".into())
            })?;

        tracing::info!(rate, "Fetched USD/UZS exchange rate");
        Ok(rate)
    }
}

#[derive(Deserialize)]
struct RatesResponse {
    rates: Option<Rates>,
}

#[derive(Deserialize)]
struct Rates {
    #[serde(rename = "UZS")]
    uzs: Option<f64>,
}

impl CurrencyConverter for ErApiConverter {
    async fn uzs_to_usd(&self, amount: i64) -> Result<i64, AppError> {
        let rate = self
            .rates
            .try_get_with(RATE_KEY, self.fetch_rate())
            .await
            .map_err(|e| AppError::CurrencyError(e.to_string()))?;

        Ok((amount as f64 / rate).round() as i64)
    }
}
