//! Counter Store Backend Selection
//!
//! Construction-time choice between the shared remote store and the
//! in-process fallback. There is deliberately no per-call fallback: once a
//! remote store is configured, a failing call surfaces its error and the
//! configured outage posture decides what the caller sees.

use crate::domain::repository::CounterStore;
use crate::error::ThrottleResult;

use super::memory::MemoryCounterStore;
use super::redis::RedisCounterStore;

/// Counter store selected at construction time
#[derive(Debug, Clone)]
pub enum CounterBackend {
    /// Shared remote store (store URL configured)
    Remote(RedisCounterStore),
    /// In-process fallback (no store URL configured)
    Local(MemoryCounterStore),
}

impl CounterBackend {
    /// Select a backend from connection settings.
    ///
    /// A present URL selects the remote store; a connection failure at this
    /// point is surfaced rather than silently degraded to local counters.
    pub async fn from_settings(url: Option<&str>, token: Option<&str>) -> ThrottleResult<Self> {
        match url {
            Some(url) => {
                let store = RedisCounterStore::connect(url, token).await?;
                tracing::info!("Throttle guard using remote counter store");
                Ok(CounterBackend::Remote(store))
            }
            None => {
                tracing::warn!(
                    "No remote counter store configured; using in-process counters \
                     (state is not shared across instances)"
                );
                Ok(CounterBackend::Local(MemoryCounterStore::new()))
            }
        }
    }
}

impl CounterStore for CounterBackend {
    async fn increment_with_ttl(&self, key: &str, window_secs: u64) -> ThrottleResult<u64> {
        match self {
            CounterBackend::Remote(store) => store.increment_with_ttl(key, window_secs).await,
            CounterBackend::Local(store) => store.increment_with_ttl(key, window_secs).await,
        }
    }

    async fn set_block(&self, key: &str, block_secs: u64) -> ThrottleResult<()> {
        match self {
            CounterBackend::Remote(store) => store.set_block(key, block_secs).await,
            CounterBackend::Local(store) => store.set_block(key, block_secs).await,
        }
    }

    async fn remaining_ttl(&self, key: &str) -> ThrottleResult<u64> {
        match self {
            CounterBackend::Remote(store) => store.remaining_ttl(key).await,
            CounterBackend::Local(store) => store.remaining_ttl(key).await,
        }
    }

    async fn delete_keys(&self, keys: &[String]) -> ThrottleResult<()> {
        match self {
            CounterBackend::Remote(store) => store.delete_keys(keys).await,
            CounterBackend::Local(store) => store.delete_keys(keys).await,
        }
    }
}
