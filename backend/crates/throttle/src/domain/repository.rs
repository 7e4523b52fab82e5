//! Counter Store Traits
//!
//! Interface the guard requires from its shared counter store.
//! Implementations are in the infrastructure layer.

use crate::error::ThrottleResult;

/// Counter store trait
///
/// All mutable guard state lives behind this interface. Both implementations
/// (remote Redis, in-process table) must uphold the same contract:
/// increments to one key serialize, and a key's expiry is set exactly once,
/// by the increment that creates it.
#[trait_variant::make(CounterStore: Send)]
pub trait LocalCounterStore {
    /// Atomically increment the counter at `key` and return the
    /// post-increment value. When the increment creates the key, its expiry
    /// is set to `window_secs` from now in the same atomic step; later
    /// increments never extend it.
    async fn increment_with_ttl(&self, key: &str, window_secs: u64) -> ThrottleResult<u64>;

    /// Set a block sentinel at `key` expiring after `block_secs`,
    /// overwriting any existing value and TTL.
    async fn set_block(&self, key: &str, block_secs: u64) -> ThrottleResult<()>;

    /// Seconds remaining before `key` expires, or 0 when the key is absent.
    async fn remaining_ttl(&self, key: &str) -> ThrottleResult<u64>;

    /// Best-effort deletion. Deleting a non-existent key is not an error.
    async fn delete_keys(&self, keys: &[String]) -> ThrottleResult<()>;
}
