//! Inbound header names and client IP resolution.

use axum::http::HeaderMap;

pub const X_SESSION_ID: &str = "x-session-id";
pub const X_CSRF_TOKEN: &str = "x-csrf-token";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";
pub const CF_CONNECTING_IP: &str = "cf-connecting-ip";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Client IP used when no proxy header identifies the caller.
pub const UNKNOWN_CLIENT_IP: &str = "unknown";

/// Resolve the client IP from proxy headers.
///
/// Precedence: left-most `X-Forwarded-For` entry, `X-Real-IP`,
/// `CF-Connecting-IP`, then `"unknown"`. Proxies append to
/// `X-Forwarded-For`, so its first entry is the original client.
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    header_value(headers, X_FORWARDED_FOR)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_value(headers, X_REAL_IP))
        .or_else(|| header_value(headers, CF_CONNECTING_IP))
        .unwrap_or(UNKNOWN_CLIENT_IP)
        .to_string()
}

/// Trimmed, non-empty, visible-ASCII value of `name`.
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
