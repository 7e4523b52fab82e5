//! Abuse Throttle Guard
//!
//! Clean Architecture structure:
//! - `domain/` - key codec, policy values, counter store traits
//! - `application/` - guard use case and configuration
//! - `infra/` - remote (Redis) and in-process store implementations
//!
//! ## Security Model
//! - Failures/attempts are counted per user identity AND per network origin
//!   over a sliding window (first event starts it, TTL never extended)
//! - Crossing either threshold blocks both dimensions for the block duration
//! - Denials never reveal which dimension tripped
//! - The guard never performs the protected operation; callers check first
//!   and report outcomes back

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::{StoreErrorPolicy, ThrottleConfig};
pub use application::guard::{GuardDecision, RecordOutcome, ThrottleGuard};
pub use domain::key::{Dimension, Operation, Purpose, derive_key};
pub use domain::policy::Policy;
pub use domain::repository::CounterStore;
pub use error::{ThrottleError, ThrottleResult};
pub use infra::{CounterBackend, MemoryCounterStore, RedisCounterStore};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

/// Guard wired to the construction-time store selection
pub type Throttle = ThrottleGuard<CounterBackend>;

#[cfg(test)]
mod tests;
