//! Unit tests for the throttle crate

#[cfg(test)]
mod memory_store_tests {
    use crate::domain::repository::CounterStore;
    use crate::infra::MemoryCounterStore;
    use std::time::Duration;

    #[tokio::test]
    async fn test_increment_counts_up() {
        let store = MemoryCounterStore::new();

        assert_eq!(store.increment_with_ttl("k", 60).await.unwrap(), 1);
        assert_eq!(store.increment_with_ttl("k", 60).await.unwrap(), 2);
        assert_eq!(store.increment_with_ttl("k", 60).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryCounterStore::new();

        assert_eq!(store.increment_with_ttl("a", 60).await.unwrap(), 1);
        assert_eq!(store.increment_with_ttl("b", 60).await.unwrap(), 1);
        assert_eq!(store.increment_with_ttl("a", 60).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_remaining_ttl_absent_key_is_zero() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.remaining_ttl("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_sets_window_once() {
        let store = MemoryCounterStore::new();

        store.increment_with_ttl("k", 4).await.unwrap();
        let fresh = store.remaining_ttl("k").await.unwrap();
        assert!((3..=4).contains(&fresh), "fresh ttl was {fresh}");

        tokio::time::sleep(Duration::from_millis(1200)).await;

        // The second increment must not reset the window.
        store.increment_with_ttl("k", 4).await.unwrap();
        let after = store.remaining_ttl("k").await.unwrap();
        assert!((1..=3).contains(&after), "ttl after sleep was {after}");
        assert!(after < fresh);
    }

    #[tokio::test]
    async fn test_expired_window_restarts_count() {
        let store = MemoryCounterStore::new();

        assert_eq!(store.increment_with_ttl("k", 1).await.unwrap(), 1);
        assert_eq!(store.increment_with_ttl("k", 1).await.unwrap(), 2);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(store.increment_with_ttl("k", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_set_block_refreshes_ttl() {
        let store = MemoryCounterStore::new();

        store.set_block("b", 2).await.unwrap();
        store.set_block("b", 600).await.unwrap();

        let ttl = store.remaining_ttl("b").await.unwrap();
        assert!((599..=600).contains(&ttl), "ttl was {ttl}");
    }

    #[tokio::test]
    async fn test_delete_keys_is_idempotent() {
        let store = MemoryCounterStore::new();

        store.increment_with_ttl("k", 60).await.unwrap();
        let keys = vec!["k".to_string(), "never-existed".to_string()];

        store.delete_keys(&keys).await.unwrap();
        store.delete_keys(&keys).await.unwrap();

        assert_eq!(store.remaining_ttl("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired_drops_only_dead_entries() {
        let store = MemoryCounterStore::new();

        store.increment_with_ttl("short", 1).await.unwrap();
        store.increment_with_ttl("long", 600).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.remaining_ttl("long").await.unwrap() > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_lose_no_updates() {
        let store = MemoryCounterStore::new();

        let mut handles = Vec::new();
        for _ in 0..100 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment_with_ttl("hot", 60).await.unwrap()
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();

        // Every increment observed a distinct value: no lost updates.
        let expected: Vec<u64> = (1..=100).collect();
        assert_eq!(counts, expected);
    }
}

#[cfg(test)]
mod guard_tests {
    use crate::application::config::ThrottleConfig;
    use crate::application::guard::ThrottleGuard;
    use crate::domain::key::{Dimension, Operation, Purpose, derive_key};
    use crate::domain::repository::CounterStore;
    use crate::infra::MemoryCounterStore;
    use axum::http::{HeaderMap, HeaderValue};
    use std::sync::Arc;

    fn req_from_ip(ip: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(ip).unwrap());
        headers
    }

    fn guard() -> (ThrottleGuard<MemoryCounterStore>, Arc<MemoryCounterStore>) {
        let store = Arc::new(MemoryCounterStore::new());
        let guard = ThrottleGuard::new(store.clone(), Arc::new(ThrottleConfig::default()));
        (guard, store)
    }

    #[tokio::test]
    async fn test_threshold_trip_blocks_login() {
        let (guard, _) = guard();
        let headers = req_from_ip("1.2.3.4");

        for _ in 0..2 {
            let outcome = guard
                .record_login_failure("u@e.com", &headers)
                .await
                .unwrap();
            assert!(!outcome.blocked);
        }

        let outcome = guard
            .record_login_failure("u@e.com", &headers)
            .await
            .unwrap();
        assert!(outcome.blocked);
        assert_eq!(outcome.retry_after_secs, Some(3600));

        let decision = guard
            .ensure_login_allowed("u@e.com", &headers)
            .await
            .unwrap();
        assert!(!decision.allowed);
        let retry = decision.retry_after_secs.unwrap();
        assert!(retry > 0 && retry <= 3600, "retry was {retry}");
    }

    #[tokio::test]
    async fn test_identity_block_follows_across_origins() {
        let (guard, _) = guard();

        for _ in 0..3 {
            guard
                .record_login_failure("u@e.com", &req_from_ip("9.9.9.9"))
                .await
                .unwrap();
        }

        // Same identity, different network: still blocked.
        let decision = guard
            .ensure_login_allowed("u@e.com", &req_from_ip("7.7.7.7"))
            .await
            .unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_origin_block_covers_all_identities() {
        let (guard, _) = guard();
        let headers = req_from_ip("9.9.9.9");

        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            guard.record_login_failure(email, &headers).await.unwrap();
        }

        // Fresh identity from the same origin: blocked.
        let decision = guard
            .ensure_login_allowed("d@x.com", &headers)
            .await
            .unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_clear_resets_count_and_block() {
        let (guard, _) = guard();
        let headers = req_from_ip("1.2.3.4");

        for _ in 0..3 {
            guard
                .record_login_failure("u@e.com", &headers)
                .await
                .unwrap();
        }
        assert!(
            !guard
                .ensure_login_allowed("u@e.com", &headers)
                .await
                .unwrap()
                .allowed
        );

        guard
            .clear_login_failures("u@e.com", &headers)
            .await
            .unwrap();

        let decision = guard
            .ensure_login_allowed("u@e.com", &headers)
            .await
            .unwrap();
        assert!(decision.allowed);

        // History restarts at one.
        let outcome = guard
            .record_login_failure("u@e.com", &headers)
            .await
            .unwrap();
        assert!(!outcome.blocked);
        assert!(
            guard
                .ensure_login_allowed("u@e.com", &headers)
                .await
                .unwrap()
                .allowed
        );
    }

    #[tokio::test]
    async fn test_clear_without_history_succeeds() {
        let (guard, _) = guard();
        let headers = req_from_ip("1.2.3.4");

        guard
            .clear_login_failures("nobody@e.com", &headers)
            .await
            .unwrap();
        guard
            .clear_signup_attempts("nobody@e.com", &headers)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_signup_check_has_no_counting_side_effect() {
        // Retried allowance checks (e.g. client retries) must never count
        // as attempts; only record_signup_attempt does.
        let (guard, store) = guard();
        let headers = req_from_ip("5.5.5.5");

        for _ in 0..10 {
            let decision = guard
                .ensure_signup_allowed("new@e.com", &headers)
                .await
                .unwrap();
            assert!(decision.allowed);
        }

        let attempt_key = derive_key(
            Operation::Signup,
            Purpose::Attempt,
            Dimension::Identity,
            "new@e.com",
        );
        assert_eq!(store.remaining_ttl(&attempt_key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_signup_blocks_at_five_attempts() {
        let (guard, _) = guard();
        let headers = req_from_ip("5.5.5.5");

        for _ in 0..4 {
            let outcome = guard
                .record_signup_attempt("new@e.com", &headers)
                .await
                .unwrap();
            assert!(!outcome.blocked);
        }

        let outcome = guard
            .record_signup_attempt("new@e.com", &headers)
            .await
            .unwrap();
        assert!(outcome.blocked);

        assert!(
            !guard
                .ensure_signup_allowed("new@e.com", &headers)
                .await
                .unwrap()
                .allowed
        );
    }

    #[tokio::test]
    async fn test_login_and_signup_counters_are_separate() {
        let (guard, _) = guard();
        let headers = req_from_ip("6.6.6.6");

        for _ in 0..3 {
            guard
                .record_signup_attempt("u@e.com", &headers)
                .await
                .unwrap();
        }

        // Three signup attempts are below the signup threshold and never
        // touch the login counters.
        assert!(
            guard
                .ensure_signup_allowed("u@e.com", &headers)
                .await
                .unwrap()
                .allowed
        );
        assert!(
            guard
                .ensure_login_allowed("u@e.com", &headers)
                .await
                .unwrap()
                .allowed
        );
    }

    #[tokio::test]
    async fn test_denial_reports_stricter_of_two_blocks() {
        let (guard, store) = guard();

        let identity_block =
            derive_key(Operation::Login, Purpose::Block, Dimension::Identity, "u@e.com");
        let origin_block =
            derive_key(Operation::Login, Purpose::Block, Dimension::Origin, "1.2.3.4");
        store.set_block(&identity_block, 100).await.unwrap();
        store.set_block(&origin_block, 600).await.unwrap();

        let decision = guard
            .ensure_allowed("u@e.com", "1.2.3.4", Operation::Login)
            .await
            .unwrap();
        assert!(!decision.allowed);
        let retry = decision.retry_after_secs.unwrap();
        assert!((599..=600).contains(&retry), "retry was {retry}");
    }

    #[tokio::test]
    async fn test_decision_serialization() {
        let (guard, _) = guard();
        let headers = req_from_ip("1.2.3.4");

        let decision = guard
            .ensure_login_allowed("u@e.com", &headers)
            .await
            .unwrap();
        let json = serde_json::to_string(&decision).unwrap();
        assert_eq!(json, r#"{"allowed":true}"#);

        for _ in 0..3 {
            guard
                .record_login_failure("u@e.com", &headers)
                .await
                .unwrap();
        }
        let decision = guard
            .ensure_login_allowed("u@e.com", &headers)
            .await
            .unwrap();
        let json = serde_json::to_string(&decision).unwrap();
        assert!(json.contains(r#""allowed":false"#));
        assert!(json.contains(r#""retryAfterSecs":"#));
    }

    #[tokio::test]
    async fn test_denial_converts_to_retry_after_error() {
        let (guard, _) = guard();
        let headers = req_from_ip("1.2.3.4");

        let allowed = guard
            .ensure_login_allowed("u@e.com", &headers)
            .await
            .unwrap();
        assert!(allowed.to_app_error().is_none());

        for _ in 0..3 {
            guard
                .record_login_failure("u@e.com", &headers)
                .await
                .unwrap();
        }
        let denied = guard
            .ensure_login_allowed("u@e.com", &headers)
            .await
            .unwrap();
        let err = denied.to_app_error().unwrap();
        assert_eq!(err.status_code(), 429);
        assert!(err.retry_after_secs().is_some());
    }

    #[tokio::test]
    async fn test_missing_headers_attribute_unknown_origin() {
        let (guard, store) = guard();
        let headers = HeaderMap::new();

        guard
            .record_login_failure("u@e.com", &headers)
            .await
            .unwrap();

        let origin_key = derive_key(
            Operation::Login,
            Purpose::Fail,
            Dimension::Origin,
            "unknown",
        );
        assert!(store.remaining_ttl(&origin_key).await.unwrap() > 0);
    }
}

#[cfg(test)]
mod outage_posture_tests {
    use crate::application::config::{StoreErrorPolicy, ThrottleConfig};
    use crate::application::guard::ThrottleGuard;
    use crate::domain::key::Operation;
    use crate::domain::repository::CounterStore;
    use crate::error::{ThrottleError, ThrottleResult};
    use std::sync::Arc;

    /// Store stub standing in for an unreachable remote store.
    struct FailingStore;

    fn store_error() -> ThrottleError {
        ThrottleError::Store(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )))
    }

    impl CounterStore for FailingStore {
        async fn increment_with_ttl(&self, _key: &str, _window_secs: u64) -> ThrottleResult<u64> {
            Err(store_error())
        }

        async fn set_block(&self, _key: &str, _block_secs: u64) -> ThrottleResult<()> {
            Err(store_error())
        }

        async fn remaining_ttl(&self, _key: &str) -> ThrottleResult<u64> {
            Err(store_error())
        }

        async fn delete_keys(&self, _keys: &[String]) -> ThrottleResult<()> {
            Err(store_error())
        }
    }

    fn guard_with_policy(policy: StoreErrorPolicy) -> ThrottleGuard<FailingStore> {
        let config = ThrottleConfig {
            store_error_policy: policy,
            ..ThrottleConfig::default()
        };
        ThrottleGuard::new(Arc::new(FailingStore), Arc::new(config))
    }

    #[tokio::test]
    async fn test_propagate_surfaces_store_errors() {
        let guard = guard_with_policy(StoreErrorPolicy::Propagate);

        let result = guard.ensure_allowed("u@e.com", "1.2.3.4", Operation::Login).await;
        assert!(matches!(result, Err(ThrottleError::Store(_))));

        let result = guard.record("u@e.com", "1.2.3.4", Operation::Login).await;
        assert!(matches!(result, Err(ThrottleError::Store(_))));

        let result = guard
            .clear_failures("u@e.com", "1.2.3.4", Operation::Login)
            .await;
        assert!(matches!(result, Err(ThrottleError::Store(_))));
    }

    #[tokio::test]
    async fn test_fail_open_allows_on_store_error() {
        let guard = guard_with_policy(StoreErrorPolicy::FailOpen);

        let decision = guard
            .ensure_allowed("u@e.com", "1.2.3.4", Operation::Login)
            .await
            .unwrap();
        assert!(decision.allowed);

        let outcome = guard
            .record("u@e.com", "1.2.3.4", Operation::Login)
            .await
            .unwrap();
        assert!(!outcome.blocked);

        guard
            .clear_failures("u@e.com", "1.2.3.4", Operation::Login)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fail_closed_denies_on_store_error() {
        let guard = guard_with_policy(StoreErrorPolicy::FailClosed);

        let decision = guard
            .ensure_allowed("u@e.com", "1.2.3.4", Operation::Login)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert!(decision.retry_after_secs.is_none());

        let outcome = guard
            .record("u@e.com", "1.2.3.4", Operation::Login)
            .await
            .unwrap();
        assert!(outcome.blocked);
    }
}

#[cfg(test)]
mod backend_tests {
    use crate::domain::repository::CounterStore;
    use crate::infra::CounterBackend;

    #[tokio::test]
    async fn test_missing_url_selects_local_store() {
        let backend = CounterBackend::from_settings(None, None).await.unwrap();
        assert!(matches!(backend, CounterBackend::Local(_)));

        // The fallback honors the store contract end to end.
        assert_eq!(backend.increment_with_ttl("k", 60).await.unwrap(), 1);
        assert_eq!(backend.increment_with_ttl("k", 60).await.unwrap(), 2);
        backend.delete_keys(&["k".to_string()]).await.unwrap();
        assert_eq!(backend.remaining_ttl("k").await.unwrap(), 0);
    }
}
