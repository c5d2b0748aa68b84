use thiserror::Error;

/// Application-wide error types for the harvester.
#[derive(Error, Debug)]
pub enum AppError {
    /// Queue message is not a usable task (malformed URL, disallowed host).
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Could not connect to the proxy or the origin.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// Any other HTTP/transport failure.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Every proxy in the pool is blocked.
    #[error("No available proxies: all proxies are blocked")]
    PoolExhausted,

    /// A mandatory part of the document is missing or has an unexpected shape.
    #[error("Structural parse error: {0}")]
    StructuralParse(String),

    /// The document's property type has no registered extractor.
    #[error("Unknown property type: {0}")]
    UnknownPropertyType(String),

    /// Categorical-enrichment service call failed.
    #[error("Enrichment error: {0}")]
    EnrichmentError(String),

    /// Currency conversion failed.
    #[error("Currency error: {0}")]
    CurrencyError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Work queue operation failed.
    #[error("Queue error: {0}")]
    QueueError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Stable classification label, used in every failure log line.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidTask(_) => "invalid_task",
            AppError::Timeout(_) => "timeout",
            AppError::ConnectionFailure(_) => "connection_failure",
            AppError::HttpError(_) => "http",
            AppError::PoolExhausted => "pool_exhausted",
            AppError::StructuralParse(_) => "structural_parse",
            AppError::UnknownPropertyType(_) => "unknown_property_type",
            AppError::EnrichmentError(_) => "enrichment",
            AppError::CurrencyError(_) => "currency",
            AppError::DatabaseError(_) => "database",
            AppError::QueueError(_) => "queue",
            AppError::ConfigError(_) => "config",
            AppError::SerializationError(_) => "serialization",
            AppError::Generic(_) => "other",
        }
    }

    /// Returns true if trying the same URL through another proxy may succeed.
    ///
    /// Unknown failures fail open: they rotate the proxy rather than abandon the task.
    pub fn is_proxy_rotatable(&self) -> bool {
        matches!(
            self,
            AppError::Timeout(_)
                | AppError::ConnectionFailure(_)
                | AppError::HttpError(_)
                | AppError::Generic(_)
        )
    }

    /// Returns true if the page content, not the transport, is at fault.
    pub fn is_content_error(&self) -> bool {
        matches!(
            self,
            AppError::StructuralParse(_) | AppError::UnknownPropertyType(_)
        )
    }
}
