//! Least-used-first pool of outbound proxy addresses.
//!
//! Selection picks the unblocked address with the lowest usage count,
//! ties broken by address order. Blocking is sticky for the lifetime of
//! the pool: nothing unblocks an address except an explicit [`ProxyPool::unblock`].
//!
//! All state lives behind one mutex, so `select`, `block` and `unblock`
//! are serialized even when called from concurrent fetch attempts.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default)]
struct ProxyState {
    usage_count: u64,
    blocked: bool,
}

/// Snapshot of one proxy's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyRecord {
    pub address: String,
    pub usage_count: u64,
    pub blocked: bool,
}

/// Aggregate pool statistics for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyPoolStats {
    pub total: usize,
    pub available: usize,
    pub blocked: usize,
    pub proxies: Vec<ProxyRecord>,
}

#[derive(Debug, Default)]
pub struct ProxyPool {
    proxies: Mutex<BTreeMap<String, ProxyState>>,
}

impl ProxyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool already loaded with `addresses`.
    pub fn from_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pool = Self::new();
        pool.load(addresses);
        pool
    }

    /// Acquires the state lock, recovering from poison if necessary.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ProxyState>> {
        self.proxies.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned proxy pool mutex");
            poisoned.into_inner()
        })
    }

    /// Initialize every address as unused and unblocked.
    ///
    /// Meant to run once at startup, before the first `select`.
    pub fn load<I, S>(&self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut proxies = self.lock();
        for address in addresses {
            proxies.insert(address.into(), ProxyState::default());
        }
        tracing::info!(total = proxies.len(), "Proxy pool loaded");
    }

    /// Pick the least-used unblocked address and count one use against it.
    pub fn select(&self) -> Result<String, AppError> {
        let mut proxies = self.lock();

        let (address, state) = proxies
            .iter_mut()
            .filter(|(_, state)| !state.blocked)
            .min_by_key(|(_, state)| state.usage_count)
            .ok_or_else(|| {
                tracing::error!("No available proxies: all proxies are blocked");
                AppError::PoolExhausted
            })?;

        state.usage_count += 1;
        tracing::debug!(proxy = %address, used = state.usage_count, "Selected proxy");

        Ok(address.clone())
    }

    pub fn block(&self, address: &str) {
        let mut proxies = self.lock();
        match proxies.get_mut(address) {
            Some(state) => {
                state.blocked = true;
                tracing::warn!(proxy = %address, used = state.usage_count, "Proxy blocked");
            }
            None => tracing::warn!(proxy = %address, "Attempted to block unknown proxy"),
        }
    }

    pub fn unblock(&self, address: &str) {
        let mut proxies = self.lock();
        match proxies.get_mut(address) {
            Some(state) => {
                state.blocked = false;
                tracing::info!(proxy = %address, "Proxy unblocked");
            }
            None => tracing::warn!(proxy = %address, "Attempted to unblock unknown proxy"),
        }
    }

    /// Zero every usage counter. Maintenance operation, not on the hot path.
    pub fn reset_usage(&self) {
        let mut proxies = self.lock();
        for state in proxies.values_mut() {
            state.usage_count = 0;
        }
        tracing::info!("Proxy usage counters reset");
    }

    pub fn unblocked_count(&self) -> usize {
        self.lock().values().filter(|s| !s.blocked).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn record(&self, address: &str) -> Option<ProxyRecord> {
        self.lock().get(address).map(|state| ProxyRecord {
            address: address.to_string(),
            usage_count: state.usage_count,
            blocked: state.blocked,
        })
    }

    pub fn stats(&self) -> ProxyPoolStats {
        let proxies = self.lock();
        let records: Vec<ProxyRecord> = proxies
            .iter()
            .map(|(address, state)| ProxyRecord {
                address: address.clone(),
                usage_count: state.usage_count,
                blocked: state.blocked,
            })
            .collect();
        let blocked = records.iter().filter(|r| r.blocked).count();

        ProxyPoolStats {
            total: records.len(),
            available: records.len() - blocked,
            blocked,
            proxies: records,
        }
    }
}
