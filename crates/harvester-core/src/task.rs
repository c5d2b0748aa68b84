use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use url::Url;
use uuid::Uuid;

use crate::error::AppError;

/// Gate every task passes before any network access.
///
/// A task is valid when its body parses as an absolute http(s) URL whose
/// host is on the allow-list.
#[derive(Debug, Clone)]
pub struct TaskValidator {
    allowed_domains: HashSet<String>,
}

impl TaskValidator {
    pub fn new<I, S>(allowed_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_domains: allowed_domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn validate(&self, raw: &str) -> Result<Url, AppError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| AppError::InvalidTask(format!("malformed URL {raw:?}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::InvalidTask(format!(
                    "URL scheme '{scheme}' is not allowed (only http/https)"
                )));
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| AppError::InvalidTask(format!("URL has no host: {raw:?}")))?
            .to_lowercase();

        if !self.allowed_domains.contains(&host) {
            return Err(AppError::InvalidTask(format!(
                "domain {host} is not allowed for parsing"
            )));
        }

        Ok(url)
    }
}

/// What the consumer tells the queue about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// Remove the message permanently.
    Ack,
    /// Negative acknowledgment with redelivery requested.
    Requeue,
}

impl AckDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckDecision::Ack => "ack",
            AckDecision::Requeue => "requeue",
        }
    }
}

impl fmt::Display for AckDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for a consumer process.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub consumer_id: String,
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    /// Minimum pause after a delivered task.
    pub success_pause: Duration,
    /// Maximum random jitter added on top of `success_pause`.
    pub success_jitter: Duration,
    /// Acknowledge tasks whose URL is already stored without fetching them.
    pub skip_known_urls: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            consumer_id: format!("consumer-{}", &Uuid::new_v4().to_string()[..8]),
            poll_interval: Duration::from_secs(5),
            success_pause: Duration::from_secs(1),
            success_jitter: Duration::from_secs(1),
            skip_known_urls: false,
        }
    }
}

impl ConsumerConfig {
    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_success_pause(mut self, pause: Duration, jitter: Duration) -> Self {
        self.success_pause = pause;
        self.success_jitter = jitter;
        self
    }

    pub fn with_skip_known_urls(mut self, skip: bool) -> Self {
        self.skip_known_urls = skip;
        self
    }

    /// Pause to take after a delivered task (base + uniform [0, jitter)).
    pub fn effective_pause(&self) -> Duration {
        let jitter_ms = rand_jitter_ms(self.success_jitter.as_millis() as u64);
        self.success_pause + Duration::from_millis(jitter_ms)
    }
}

// Xorshift seeded from the clock: good enough for jitter, not crypto.
fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
