//! Throttle Error Types
//!
//! This module provides throttle-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Throttle-specific result type alias
pub type ThrottleResult<T> = Result<T, ThrottleError>;

/// Throttle-specific error variants
///
/// Configuration problems never surface here (they fall back to defaults at
/// resolution time); the only failure mode the guard exposes is the counter
/// store itself.
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// Counter store call failed (network error, remote unavailability)
    #[error("Counter store error: {0}")]
    Store(#[from] redis::RedisError),
}

impl ThrottleError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ThrottleError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ThrottleError::Store(_) => ErrorKind::ServiceUnavailable,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        AppError::new(self.kind(), self.to_string())
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            ThrottleError::Store(e) => {
                tracing::error!(error = %e, "Counter store error");
            }
        }
    }
}

impl From<ThrottleError> for AppError {
    fn from(err: ThrottleError) -> Self {
        err.to_app_error()
    }
}

impl IntoResponse for ThrottleError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        // Return empty body for security (don't leak details)
        (status, ()).into_response()
    }
}
