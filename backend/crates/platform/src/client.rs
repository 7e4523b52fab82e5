//! Client identification utilities
//!
//! Common functions for attributing a network origin to HTTP requests.

use axum::http::HeaderMap;

/// Origin reported when no header yields a usable value
pub const UNKNOWN_ORIGIN: &str = "unknown";

/// Forwarded client list set by reverse proxies (first entry wins)
const FORWARDED_FOR: &str = "x-forwarded-for";
/// Single client address set by some proxies (e.g. nginx)
const REAL_IP: &str = "x-real-ip";
/// CDN-specific client address (Cloudflare)
const CDN_CLIENT_IP: &str = "cf-connecting-ip";

/// Extract the caller's best-effort network origin from request headers
///
/// Checks `X-Forwarded-For` first (taking the first comma-separated entry),
/// then `X-Real-IP`, then `CF-Connecting-IP`, and falls back to the literal
/// `"unknown"`.
///
/// All of these headers are client-controlled unless the deployment
/// terminates HTTP at a trusted reverse proxy that overwrites them. This
/// function does not validate trust; deploy behind infrastructure that
/// sanitizes these headers.
///
/// ## Arguments
/// * `headers` - HTTP request headers
///
/// ## Returns
/// The attributed origin string, never empty
pub fn extract_origin(headers: &HeaderMap) -> String {
    if let Some(xff) = header_str(headers, FORWARDED_FOR) {
        if let Some(first) = xff.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    for name in [REAL_IP, CDN_CLIENT_IP] {
        if let Some(value) = header_str(headers, name) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    UNKNOWN_ORIGIN.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
