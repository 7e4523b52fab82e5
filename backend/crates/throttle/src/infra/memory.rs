//! In-Process Counter Store
//!
//! Fallback used when no remote store is configured. Counters live in a
//! single table behind an async mutex, so all read-modify-write on counts
//! and expiries serializes at process level. State is NOT shared across
//! server instances.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::domain::repository::CounterStore;
use crate::error::ThrottleResult;

#[derive(Debug, Clone)]
struct Entry {
    count: u64,
    expires_at: Instant,
}

/// In-process counter table
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    table: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning the number removed.
    ///
    /// Entries are also dropped lazily when touched; this sweep bounds the
    /// table for keys that are never read again.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut table = self.table.lock().await;
        let before = table.len();
        table.retain(|_, entry| entry.expires_at > now);
        let removed = before - table.len();
        if removed > 0 {
            tracing::debug!(removed, "Purged expired throttle counters");
        }
        removed
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.table.lock().await.len()
    }
}

/// Seconds until expiry, rounded up so a live entry never reports 0
/// (0 is reserved for "absent").
fn remaining_secs(entry: &Entry, now: Instant) -> u64 {
    let left = entry.expires_at.saturating_duration_since(now);
    let secs = left.as_secs();
    if left.subsec_nanos() > 0 { secs + 1 } else { secs }
}

impl CounterStore for MemoryCounterStore {
    async fn increment_with_ttl(&self, key: &str, window_secs: u64) -> ThrottleResult<u64> {
        let now = Instant::now();
        let mut table = self.table.lock().await;
        let entry = table
            .entry(key.to_string())
            .and_modify(|entry| {
                if entry.expires_at <= now {
                    // Window elapsed; this increment starts a fresh one.
                    entry.count = 0;
                    entry.expires_at = now + Duration::from_secs(window_secs);
                }
                entry.count += 1;
            })
            .or_insert_with(|| Entry {
                count: 1,
                expires_at: now + Duration::from_secs(window_secs),
            });
        Ok(entry.count)
    }

    async fn set_block(&self, key: &str, block_secs: u64) -> ThrottleResult<()> {
        let mut table = self.table.lock().await;
        table.insert(
            key.to_string(),
            Entry {
                count: 1,
                expires_at: Instant::now() + Duration::from_secs(block_secs),
            },
        );
        Ok(())
    }

    async fn remaining_ttl(&self, key: &str) -> ThrottleResult<u64> {
        let now = Instant::now();
        let mut table = self.table.lock().await;
        match table.get(key) {
            Some(entry) if entry.expires_at > now => Ok(remaining_secs(entry, now)),
            Some(_) => {
                table.remove(key);
                Ok(0)
            }
            None => Ok(0),
        }
    }

    async fn delete_keys(&self, keys: &[String]) -> ThrottleResult<()> {
        let mut table = self.table.lock().await;
        for key in keys {
            table.remove(key);
        }
        Ok(())
    }
}
