//! Typed rejections surfaced to the HTTP boundary.

use std::fmt;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::security::rate_limit::RateLimitError;

/// Stable error codes clients branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityErrorCode {
    InvalidOrigin,
    RateLimited,
    InvalidCsrfToken,
    MissingEncryptionHeaders,
    InvalidTimestamp,
    InvalidSignature,
    DecryptionFailed,
    SensitiveContent,
    InvalidPrompt,
    PayloadTooLarge,
}

impl SecurityErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidOrigin => "INVALID_ORIGIN",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidCsrfToken => "INVALID_CSRF_TOKEN",
            Self::MissingEncryptionHeaders => "MISSING_ENCRYPTION_HEADERS",
            Self::InvalidTimestamp => "INVALID_TIMESTAMP",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::DecryptionFailed => "DECRYPTION_FAILED",
            Self::SensitiveContent => "SENSITIVE_CONTENT",
            Self::InvalidPrompt => "INVALID_PROMPT",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidOrigin
            | Self::InvalidSignature
            | Self::MissingEncryptionHeaders
            | Self::InvalidCsrfToken => StatusCode::FORBIDDEN,
            Self::InvalidTimestamp
            | Self::DecryptionFailed
            | Self::SensitiveContent
            | Self::InvalidPrompt => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl fmt::Display for SecurityErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request failed one stage of the admission pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {details}")]
pub struct SecurityError {
    pub code: SecurityErrorCode,
    pub details: String,
    /// Seconds until a rate-limited caller may retry.
    pub retry_after_secs: Option<u64>,
}

impl SecurityError {
    pub fn new(code: SecurityErrorCode, details: impl Into<String>) -> Self {
        Self {
            code,
            details: details.into(),
            retry_after_secs: None,
        }
    }
}

impl From<RateLimitError> for SecurityError {
    fn from(err: RateLimitError) -> Self {
        Self {
            code: SecurityErrorCode::RateLimited,
            details: format!("Too many requests ({} limit): {}", err.scope, err.details),
            retry_after_secs: Some(err.retry_after_secs),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail<'a> {
    code: SecurityErrorCode,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: self.code,
                message: &self.details,
                retry_after: self.retry_after_secs,
            },
        };
        let mut response = (self.code.status(), Json(body)).into_response();

        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
