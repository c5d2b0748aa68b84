use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_ALLOWED_DOMAINS: &[&str] = &["olx.uz", "www.olx.uz"];
const DEFAULT_ENRICHMENT_URL: &str = "http://194.87.56.245/search";

/// Settings for fetching and extraction.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub allowed_domains: Vec<String>,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub enrichment_url: String,
    /// Block a proxy in the pool when the origin answers 403 through it.
    pub block_on_forbidden: bool,
    pub skip_known_urls: bool,
    pub max_concurrent_fetches: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            allowed_domains: DEFAULT_ALLOWED_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            max_retries: 3,
            request_timeout: Duration::from_secs(10),
            enrichment_url: DEFAULT_ENRICHMENT_URL.to_string(),
            block_on_forbidden: false,
            skip_known_urls: false,
            max_concurrent_fetches: 1,
        }
    }
}

impl ParserConfig {
    /// Read configuration from environment variables.
    ///
    /// - `ALLOWED_DOMAINS` (comma list, defaults to `olx.uz,www.olx.uz`)
    /// - `MAX_RETRIES` (defaults to 3)
    /// - `REQUEST_TIMEOUT_SECS` (defaults to 10)
    /// - `ENRICHMENT_URL`
    /// - `BLOCK_ON_FORBIDDEN`, `SKIP_KNOWN_URLS` (booleans, default false)
    /// - `MAX_CONCURRENT_FETCHES` (defaults to 1)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let allowed_domains = match lookup("ALLOWED_DOMAINS") {
            Some(raw) => split_list(&raw),
            None => defaults.allowed_domains,
        };
        if allowed_domains.is_empty() {
            return Err(AppError::ConfigError(
                "ALLOWED_DOMAINS must list at least one domain".into(),
            ));
        }

        let max_retries = positive(&lookup, "MAX_RETRIES", defaults.max_retries)?;
        let timeout_secs = positive(&lookup, "REQUEST_TIMEOUT_SECS", 10u64)?;
        let max_concurrent_fetches = positive(
            &lookup,
            "MAX_CONCURRENT_FETCHES",
            defaults.max_concurrent_fetches,
        )?;

        Ok(Self {
            allowed_domains,
            max_retries,
            request_timeout: Duration::from_secs(timeout_secs),
            enrichment_url: lookup("ENRICHMENT_URL").unwrap_or(defaults.enrichment_url),
            block_on_forbidden: flag(&lookup, "BLOCK_ON_FORBIDDEN")?,
            skip_known_urls: flag(&lookup, "SKIP_KNOWN_URLS")?,
            max_concurrent_fetches,
        })
    }
}

/// Outbound proxy endpoints and credentials.
#[derive(Clone)]
pub struct ProxyConfig {
    pub ips: Vec<String>,
    pub port: u16,
    pub login: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("ips", &self.ips)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ProxyConfig {
    /// Read configuration from environment variables.
    ///
    /// - `PROXY_IPS` (required, comma list)
    /// - `PROXY_PORT` (required)
    /// - `PROXY_LOGIN`, `PROXY_PASSWORD` (optional, used only together)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let ips = lookup("PROXY_IPS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();
        if ips.is_empty() {
            return Err(AppError::ConfigError(
                "PROXY_IPS not set. At least one proxy address is required.".into(),
            ));
        }

        let raw_port = lookup("PROXY_PORT")
            .ok_or_else(|| AppError::ConfigError("PROXY_PORT not set.".into()))?;
        let port: u16 = raw_port.trim().parse().map_err(|_| {
            AppError::ConfigError(format!("Invalid PROXY_PORT '{raw_port}': must be a port number"))
        })?;

        Ok(Self {
            ips,
            port,
            login: lookup("PROXY_LOGIN").filter(|s| !s.is_empty()),
            password: lookup("PROXY_PASSWORD").filter(|s| !s.is_empty()),
        })
    }

    /// Login and password, only when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => Some((login.as_str(), password.as_str())),
            _ => None,
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn positive<L, T>(lookup: &L, key: &str, default: T) -> Result<T, AppError>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let parsed: T = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!("Invalid {key} '{raw}': must be a positive integer"))
    })?;
    if parsed <= T::default() {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(parsed)
}

fn flag<L>(lookup: &L, key: &str) -> Result<bool, AppError>
where
    L: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes") => {
            Ok(true)
        }
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" || v.eq_ignore_ascii_case("no") => {
            Ok(false)
        }
        Some(v) => Err(AppError::ConfigError(format!(
            "Invalid {key} '{v}': expected true or false"
        ))),
    }
}
