use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use harvester_core::config::ProxyConfig;
use harvester_core::error::AppError;
use harvester_core::traits::{FetchResponse, Fetcher};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, Proxy};

const REFERER_URL: &str = "https://www.olx.uz/";

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Proxied HTTP fetcher using reqwest.
///
/// Builds a fresh client for every call, bound to the chosen proxy, so no
/// connection or cookie state leaks between proxies. The client is dropped
/// before `fetch` returns. Proxy addresses without a port get the configured one.
#[derive(Clone)]
pub struct ReqwestFetcher {
    proxy_port: u16,
    credentials: Option<(String, String)>,
    timeout: Duration,
    next_agent: Arc<AtomicUsize>,
}

impl ReqwestFetcher {
    pub fn new(proxy_port: u16, timeout: Duration) -> Self {
        Self {
            proxy_port,
            credentials: None,
            timeout,
            next_agent: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_config(config: &ProxyConfig, timeout: Duration) -> Self {
        let fetcher = Self::new(config.port, timeout);
        match config.credentials() {
            Some((login, password)) => fetcher.with_credentials(login, password),
            None => fetcher,
        }
    }

    pub fn with_credentials(mut self, login: &str, password: &str) -> Self {
        self.credentials = Some((login.to_string(), password.to_string()));
        self
    }

    /// `http://host:port`, using the configured port when `address` has none.
    /// Bare IPv6 addresses are bracketed.
    fn proxy_url(&self, address: &str) -> String {
        if let Some(host) = address.strip_prefix('[') {
            return match host.split_once("]:") {
                Some((_, port)) if port.parse::<u16>().is_ok() => format!("http://{address}"),
                _ => format!("http://[{}]:{}", host.trim_end_matches(']'), self.proxy_port),
            };
        }
        match address.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => {
                format!("http://{address}")
            }
            Some(_) => format!("http://[{address}]:{}", self.proxy_port),
            None => format!("http://{address}:{}", self.proxy_port),
        }
    }

    fn user_agent(&self) -> &'static str {
        let i = self.next_agent.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[i % USER_AGENTS.len()]
    }

    fn client_for(&self, address: &str) -> Result<Client, AppError> {
        let mut proxy = Proxy::all(self.proxy_url(address))
            .map_err(|e| AppError::ConnectionFailure(format!("Invalid proxy {address}: {e}")))?;
        if let Some((login, password)) = &self.credentials {
            proxy = proxy.basic_auth(login, password);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(REFERER, HeaderValue::from_static(REFERER_URL));

        Client::builder()
            .proxy(proxy)
            .user_agent(self.user_agent())
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))
    }

    fn map_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout.as_secs())
        } else if e.is_connect() {
            AppError::ConnectionFailure(e.to_string())
        } else {
            AppError::HttpError(e.to_string())
        }
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, proxy: &str) -> Result<FetchResponse, AppError> {
        let client = self.client_for(proxy)?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_error(e))?;

        tracing::debug!(%url, %proxy, status, bytes = body.len(), "GET finished");
        Ok(FetchResponse::new(status, body))
    }
}
