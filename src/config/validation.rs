//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows, quotas and cool-downs > 0, addresses parse)
//! - Refuse to start without key material
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GuardConfig, RateLimitConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("encryption.key must be set (ENCRYPTION_KEY)")]
    MissingEncryptionKey,

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,

    #[error("security.allowed_origins entry is not an origin: {0}")]
    InvalidOrigin(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_body_size" });
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "listener.request_timeout_secs" });
    }

    check_rate_limit(
        &mut errors,
        [
            "rate_limit.window_ms",
            "rate_limit.max_requests",
            "rate_limit.idle_ttl_ms",
            "rate_limit.block_duration_ms",
        ],
        &config.rate_limit,
    );
    check_rate_limit(
        &mut errors,
        [
            "ip_rate_limit.window_ms",
            "ip_rate_limit.max_requests",
            "ip_rate_limit.idle_ttl_ms",
            "ip_rate_limit.block_duration_ms",
        ],
        &config.ip_rate_limit,
    );

    if config.encryption.key.is_empty() {
        errors.push(ValidationError::MissingEncryptionKey);
    }
    if config.encryption.max_age_ms == 0 {
        errors.push(ValidationError::Zero { field: "encryption.max_age_ms" });
    }
    if config.csrf.ttl_ms == 0 {
        errors.push(ValidationError::Zero { field: "csrf.ttl_ms" });
    }
    if config.security.max_prompt_chars == 0 {
        errors.push(ValidationError::Zero { field: "security.max_prompt_chars" });
    }
    for origin in &config.security.allowed_origins {
        if origin != "*" && url::Url::parse(origin).is_err() {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }
    if config.cleanup.enabled && config.cleanup.interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "cleanup.interval_secs" });
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_rate_limit(
    errors: &mut Vec<ValidationError>,
    [window, max, ttl, cool_down]: [&'static str; 4],
    limit: &RateLimitConfig,
) {
    if limit.window_ms == 0 {
        errors.push(ValidationError::Zero { field: window });
    }
    if limit.max_requests == 0 {
        errors.push(ValidationError::Zero { field: max });
    }
    if limit.idle_ttl_ms == 0 {
        errors.push(ValidationError::Zero { field: ttl });
    }
    if limit.block_duration_ms == Some(0) {
        errors.push(ValidationError::Zero { field: cool_down });
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
