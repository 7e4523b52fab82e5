//! Error conversions - HTTP response mapping for [`AppError`]
//!
//! Provides the feature-gated axum response conversion. Keeping this out of
//! `app_error.rs` keeps the core type framework-free.

#[cfg(feature = "axum")]
use super::app_error::AppError;

// ============================================================================
// Axum conversions (feature-gated)
// ============================================================================

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::{StatusCode, header};

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // RFC 7807 Problem Details for HTTP APIs
        let body = serde_json::json!({
            "type": format!("https://httpstatuses.io/{}", self.status_code()),
            "title": self.kind().as_str(),
            "status": self.status_code(),
            "detail": self.message(),
            "retryAfterSecs": self.retry_after_secs(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(secs) = self.retry_after_secs() {
            if let Ok(value) = header::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
