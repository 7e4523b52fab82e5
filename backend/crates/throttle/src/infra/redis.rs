//! Redis-Backed Counter Store
//!
//! Shared, network-accessible implementation used when the service runs as
//! multiple stateless instances. Mutation safety is delegated to Redis:
//! `INCR` serializes concurrent increments, and only the connection that
//! observed the count created (post-increment value 1) sets the expiry, so
//! a window's TTL is set exactly once.

use std::fmt;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, IntoConnectionInfo};

use crate::domain::repository::CounterStore;
use crate::error::ThrottleResult;

/// Namespace prefix for all guard keys
const DEFAULT_KEY_PREFIX: &str = "throttle:";

/// Redis-backed counter store
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connect with the default key prefix.
    ///
    /// `token`, when present, is applied as the connection password unless
    /// the URL already carries one.
    ///
    /// ## Errors
    /// Returns a storage error when the URL is malformed or the connection
    /// cannot be established.
    pub async fn connect(url: &str, token: Option<&str>) -> ThrottleResult<Self> {
        Self::connect_with_prefix(url, token, DEFAULT_KEY_PREFIX).await
    }

    /// Connect with a custom key prefix (used by integration tests to
    /// isolate keyspaces).
    pub async fn connect_with_prefix(
        url: &str,
        token: Option<&str>,
        key_prefix: &str,
    ) -> ThrottleResult<Self> {
        let mut info = url.into_connection_info()?;
        if info.redis.password.is_none() {
            info.redis.password = token.map(str::to_string);
        }

        let client = Client::open(info)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

impl CounterStore for RedisCounterStore {
    async fn increment_with_ttl(&self, key: &str, window_secs: u64) -> ThrottleResult<u64> {
        let key = self.key(key);
        let mut conn = self.connection.clone();

        let count: u64 = conn.incr(&key, 1u64).await?;
        if count == 1 {
            // This increment created the key; it alone sets the window.
            let _: bool = conn.expire(&key, window_secs as i64).await?;
        }

        Ok(count)
    }

    async fn set_block(&self, key: &str, block_secs: u64) -> ThrottleResult<()> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        // SET ... EX overwrites any existing TTL: a new violation always
        // restarts the block window.
        let _: () = conn.set_ex(&key, 1u8, block_secs).await?;
        Ok(())
    }

    async fn remaining_ttl(&self, key: &str) -> ThrottleResult<u64> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        // TTL returns -2 for a missing key, -1 for a key without expiry;
        // both map to "absent" for the guard.
        let ttl: i64 = conn.ttl(&key).await?;
        Ok(ttl.max(0) as u64)
    }

    async fn delete_keys(&self, keys: &[String]) -> ThrottleResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let mut conn = self.connection.clone();
        let _: u64 = conn.del(keys).await?;
        Ok(())
    }
}
