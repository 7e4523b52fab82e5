//! Throttle Guard Use Case
//!
//! Decides whether an (identity, origin) pair may attempt a protected
//! operation right now, and records the outcomes the caller reports back.
//! The guard never performs the protected operation itself: callers check
//! before the credential work, record failures/attempts after it, and clear
//! history on success.

use std::sync::Arc;

use axum::http::HeaderMap;
use kernel::error::app_error::AppError;
use serde::Serialize;

use crate::application::config::{StoreErrorPolicy, ThrottleConfig};
use crate::domain::key::{Dimension, Operation, Purpose, derive_key};
use crate::domain::repository::CounterStore;
use crate::error::ThrottleResult;
use crate::infra::CounterBackend;

/// Outcome of an allowance check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardDecision {
    pub allowed: bool,
    /// Seconds until retry is permitted; present only when a block binds.
    /// A single value for both dimensions, so callers cannot tell whether
    /// the identity or the origin tripped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl GuardDecision {
    const fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_secs: None,
        }
    }

    const fn deny(retry_after_secs: Option<u64>) -> Self {
        Self {
            allowed: false,
            retry_after_secs,
        }
    }

    /// Convert a denial into a 429 `AppError` carrying `Retry-After`.
    /// Returns `None` when the decision allows the operation.
    pub fn to_app_error(&self) -> Option<AppError> {
        if self.allowed {
            return None;
        }
        let err = AppError::too_many_requests("Too many attempts, please retry later");
        Some(match self.retry_after_secs {
            Some(secs) => err.with_retry_after(secs),
            None => err,
        })
    }
}

/// Outcome of recording a failure or attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl RecordOutcome {
    const fn counted() -> Self {
        Self {
            blocked: false,
            retry_after_secs: None,
        }
    }
}

/// Throttle guard use case
///
/// Holds no mutable state of its own; everything lives behind the counter
/// store, so any number of guard values (and server instances, with the
/// remote store) can serve the same population.
pub struct ThrottleGuard<S>
where
    S: CounterStore,
{
    store: Arc<S>,
    config: Arc<ThrottleConfig>,
}

impl<S> ThrottleGuard<S>
where
    S: CounterStore,
{
    pub fn new(store: Arc<S>, config: Arc<ThrottleConfig>) -> Self {
        Self { store, config }
    }

    /// Check whether the pair may attempt `operation` right now.
    ///
    /// Pure read: no counting side effect for any operation, signup
    /// included. Retried allowance checks never inflate counters; real
    /// attempts are recorded explicitly via [`Self::record`].
    pub async fn ensure_allowed(
        &self,
        identity: &str,
        origin: &str,
        operation: Operation,
    ) -> ThrottleResult<GuardDecision> {
        match self.check_blocks(identity, origin, operation).await {
            Ok(decision) => Ok(decision),
            Err(e) => match self.config.store_error_policy {
                StoreErrorPolicy::Propagate => Err(e),
                StoreErrorPolicy::FailOpen => {
                    tracing::error!(error = %e, operation = %operation, "Counter store unreachable, failing open");
                    Ok(GuardDecision::allow())
                }
                StoreErrorPolicy::FailClosed => {
                    tracing::error!(error = %e, operation = %operation, "Counter store unreachable, failing closed");
                    Ok(GuardDecision::deny(None))
                }
            },
        }
    }

    /// Record one failure (login) or attempt (signup) for both dimensions.
    ///
    /// When either dimension reaches the operation's threshold, BOTH the
    /// identity and the origin are blocked for the policy's block duration.
    pub async fn record(
        &self,
        identity: &str,
        origin: &str,
        operation: Operation,
    ) -> ThrottleResult<RecordOutcome> {
        match self.count_event(identity, origin, operation).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => match self.config.store_error_policy {
                StoreErrorPolicy::Propagate => Err(e),
                StoreErrorPolicy::FailOpen => {
                    tracing::error!(error = %e, operation = %operation, "Counter store unreachable, failure not recorded");
                    Ok(RecordOutcome::counted())
                }
                StoreErrorPolicy::FailClosed => {
                    tracing::error!(error = %e, operation = %operation, "Counter store unreachable, reporting blocked");
                    Ok(RecordOutcome {
                        blocked: true,
                        retry_after_secs: None,
                    })
                }
            },
        }
    }

    /// Delete the pair's counters and blocks. Idempotent; clearing keys
    /// that do not exist succeeds.
    pub async fn clear_failures(
        &self,
        identity: &str,
        origin: &str,
        operation: Operation,
    ) -> ThrottleResult<()> {
        let purpose = operation.counting_purpose();
        let keys = vec![
            derive_key(operation, purpose, Dimension::Identity, identity),
            derive_key(operation, purpose, Dimension::Origin, origin),
            derive_key(operation, Purpose::Block, Dimension::Identity, identity),
            derive_key(operation, Purpose::Block, Dimension::Origin, origin),
        ];

        match self.store.delete_keys(&keys).await {
            Ok(()) => Ok(()),
            Err(e) => match self.config.store_error_policy {
                StoreErrorPolicy::Propagate => Err(e),
                StoreErrorPolicy::FailOpen | StoreErrorPolicy::FailClosed => {
                    tracing::error!(error = %e, operation = %operation, "Counter store unreachable, clear skipped");
                    Ok(())
                }
            },
        }
    }

    async fn check_blocks(
        &self,
        identity: &str,
        origin: &str,
        operation: Operation,
    ) -> ThrottleResult<GuardDecision> {
        let identity_block = derive_key(operation, Purpose::Block, Dimension::Identity, identity);
        let origin_block = derive_key(operation, Purpose::Block, Dimension::Origin, origin);

        let identity_ttl = self.store.remaining_ttl(&identity_block).await?;
        let origin_ttl = self.store.remaining_ttl(&origin_block).await?;

        // The stricter of the two blocks binds.
        let retry_after = identity_ttl.max(origin_ttl);
        if retry_after > 0 {
            tracing::warn!(
                operation = %operation,
                retry_after_secs = retry_after,
                "Blocked operation attempt"
            );
            return Ok(GuardDecision::deny(Some(retry_after)));
        }

        Ok(GuardDecision::allow())
    }

    async fn count_event(
        &self,
        identity: &str,
        origin: &str,
        operation: Operation,
    ) -> ThrottleResult<RecordOutcome> {
        let policy = self.config.policy_for(operation);
        let purpose = operation.counting_purpose();

        let identity_key = derive_key(operation, purpose, Dimension::Identity, identity);
        let origin_key = derive_key(operation, purpose, Dimension::Origin, origin);

        let identity_count = self
            .store
            .increment_with_ttl(&identity_key, policy.window_secs())
            .await?;
        let origin_count = self
            .store
            .increment_with_ttl(&origin_key, policy.window_secs())
            .await?;

        let threshold = u64::from(policy.max_failures);
        if identity_count < threshold && origin_count < threshold {
            return Ok(RecordOutcome::counted());
        }

        // Either dimension tripping blocks both.
        let identity_block = derive_key(operation, Purpose::Block, Dimension::Identity, identity);
        let origin_block = derive_key(operation, Purpose::Block, Dimension::Origin, origin);
        self.store
            .set_block(&identity_block, policy.block_secs())
            .await?;
        self.store
            .set_block(&origin_block, policy.block_secs())
            .await?;

        tracing::warn!(
            operation = %operation,
            identity_count,
            origin_count,
            max_failures = policy.max_failures,
            block_secs = policy.block_secs(),
            "Threshold crossed, blocking identity and origin"
        );

        Ok(RecordOutcome {
            blocked: true,
            retry_after_secs: Some(policy.block_secs()),
        })
    }

    // ------------------------------------------------------------------
    // Operation-specific surface (origin extracted from request headers)
    // ------------------------------------------------------------------

    pub async fn ensure_login_allowed(
        &self,
        email: &str,
        headers: &HeaderMap,
    ) -> ThrottleResult<GuardDecision> {
        let origin = platform::client::extract_origin(headers);
        self.ensure_allowed(email, &origin, Operation::Login).await
    }

    pub async fn record_login_failure(
        &self,
        email: &str,
        headers: &HeaderMap,
    ) -> ThrottleResult<RecordOutcome> {
        let origin = platform::client::extract_origin(headers);
        self.record(email, &origin, Operation::Login).await
    }

    pub async fn clear_login_failures(
        &self,
        email: &str,
        headers: &HeaderMap,
    ) -> ThrottleResult<()> {
        let origin = platform::client::extract_origin(headers);
        self.clear_failures(email, &origin, Operation::Login).await
    }

    pub async fn ensure_signup_allowed(
        &self,
        email: &str,
        headers: &HeaderMap,
    ) -> ThrottleResult<GuardDecision> {
        let origin = platform::client::extract_origin(headers);
        self.ensure_allowed(email, &origin, Operation::Signup).await
    }

    /// Record one signup attempt. This is the only call that counts toward
    /// the signup threshold; the allowance check never does.
    pub async fn record_signup_attempt(
        &self,
        email: &str,
        headers: &HeaderMap,
    ) -> ThrottleResult<RecordOutcome> {
        let origin = platform::client::extract_origin(headers);
        self.record(email, &origin, Operation::Signup).await
    }

    pub async fn clear_signup_attempts(
        &self,
        email: &str,
        headers: &HeaderMap,
    ) -> ThrottleResult<()> {
        let origin = platform::client::extract_origin(headers);
        self.clear_failures(email, &origin, Operation::Signup).await
    }
}

impl ThrottleGuard<CounterBackend> {
    /// Build a guard from environment configuration.
    ///
    /// A configured store URL selects the remote store. A connection
    /// failure at construction is surfaced regardless of the outage
    /// posture; the posture only governs calls after a store exists.
    pub async fn from_env() -> ThrottleResult<Self> {
        let config = ThrottleConfig::from_env();
        let backend =
            CounterBackend::from_settings(config.redis_url.as_deref(), config.redis_token.as_deref())
                .await?;
        Ok(Self::new(Arc::new(backend), Arc::new(config)))
    }
}
