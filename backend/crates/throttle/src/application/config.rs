//! Application Configuration
//!
//! Configuration for the throttle guard. Resolved once, at construction,
//! into an immutable struct; policies are never re-read from the
//! environment per call.

use std::env;

use crate::domain::key::Operation;
use crate::domain::policy::Policy;

/// Posture when the configured counter store is unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreErrorPolicy {
    /// Surface the storage error to the caller
    #[default]
    Propagate,
    /// Treat a storage error as allowed, prioritizing availability
    FailOpen,
    /// Treat a storage error as blocked, prioritizing safety
    FailClosed,
}

impl StoreErrorPolicy {
    /// Parse a configuration value. Unrecognized values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "propagate" => Some(StoreErrorPolicy::Propagate),
            "fail-open" | "fail_open" => Some(StoreErrorPolicy::FailOpen),
            "fail-closed" | "fail_closed" => Some(StoreErrorPolicy::FailClosed),
            _ => None,
        }
    }
}

/// Throttle guard configuration
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Login policy (counts confirmed failures)
    pub login: Policy,
    /// Signup policy (counts attempts)
    pub signup: Policy,
    /// Remote counter store URL; absent selects the in-process fallback
    pub redis_url: Option<String>,
    /// Remote counter store token, applied as the connection password when
    /// the URL carries none
    pub redis_token: Option<String>,
    /// Posture when the configured store is unreachable
    pub store_error_policy: StoreErrorPolicy,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            login: Policy::new(3, 3600, 3600),
            signup: Policy::new(5, 3600, 3600),
            redis_url: None,
            redis_token: None,
            store_error_policy: StoreErrorPolicy::default(),
        }
    }
}

impl ThrottleConfig {
    /// Resolve configuration from the environment.
    ///
    /// Absent or invalid values fall back to the defaults. A malformed
    /// numeric setting is logged and substituted, never surfaced as an
    /// error.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            login: Policy::new(
                threshold_setting("LOGIN_MAX_FAILURES", defaults.login.max_failures),
                duration_setting("LOGIN_WINDOW_SECONDS", defaults.login.window_secs()),
                duration_setting("LOGIN_BLOCK_SECONDS", defaults.login.block_secs()),
            ),
            signup: Policy::new(
                threshold_setting("SIGNUP_MAX_ATTEMPTS", defaults.signup.max_failures),
                duration_setting("SIGNUP_WINDOW_SECONDS", defaults.signup.window_secs()),
                duration_setting("SIGNUP_BLOCK_SECONDS", defaults.signup.block_secs()),
            ),
            redis_url: env_value("THROTTLE_REDIS_URL"),
            redis_token: env_value("THROTTLE_REDIS_TOKEN"),
            store_error_policy: resolve_store_error_policy(
                env_value("THROTTLE_STORE_ERROR_POLICY").as_deref(),
            ),
        }
    }

    /// Policy for one protected operation
    pub fn policy_for(&self, operation: Operation) -> Policy {
        match operation {
            Operation::Login => self.login,
            Operation::Signup => self.signup,
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn threshold_setting(name: &str, default: u32) -> u32 {
    parse_setting(env_value(name).as_deref(), name, default, |n| n >= 1)
}

fn duration_setting(name: &str, default: u64) -> u64 {
    parse_setting(env_value(name).as_deref(), name, default, |n| n > 0)
}

/// Parse one numeric setting, falling back to `default` when the value is
/// absent, unparseable, or outside the valid range.
fn parse_setting<T>(raw: Option<&str>, name: &str, default: T, valid: impl Fn(T) -> bool) -> T
where
    T: std::str::FromStr + Copy,
{
    match raw {
        None => default,
        Some(value) => match value.parse::<T>() {
            Ok(n) if valid(n) => n,
            _ => {
                tracing::warn!(
                    setting = name,
                    value,
                    "Invalid throttle setting, using default"
                );
                default
            }
        },
    }
}

fn resolve_store_error_policy(raw: Option<&str>) -> StoreErrorPolicy {
    match raw {
        None => StoreErrorPolicy::default(),
        Some(value) => StoreErrorPolicy::parse(value).unwrap_or_else(|| {
            tracing::warn!(value, "Unrecognized store error policy, using default");
            StoreErrorPolicy::default()
        }),
    }
}
