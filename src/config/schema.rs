//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the admission guard.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address, body and time limits).
    pub listener: ListenerConfig,

    /// Per-session rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Per-client-IP rate limiting.
    #[serde(default = "RateLimitConfig::ip_default")]
    pub ip_rate_limit: RateLimitConfig,

    /// Payload encryption and signing.
    pub encryption: EncryptionConfig,

    /// CSRF token settings.
    pub csrf: CsrfConfig,

    /// Origin allow-list and prompt policy.
    pub security: SecurityConfig,

    /// Background sweep of idle limiter and token entries.
    pub cleanup: CleanupConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            ip_rate_limit: RateLimitConfig::ip_default(),
            encryption: EncryptionConfig::default(),
            csrf: CsrfConfig::default(),
            security: SecurityConfig::default(),
            cleanup: CleanupConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 30,
        }
    }
}

/// Fixed-window rate limit parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Admitted requests per window.
    pub max_requests: u32,

    /// Cool-down applied when the quota is exceeded.
    /// Unset means "until the current window ends".
    pub block_duration_ms: Option<u64>,

    /// Idle time after which an unblocked record may be evicted.
    pub idle_ttl_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 10,
            block_duration_ms: None,
            idle_ttl_ms: 3_600_000,
        }
    }
}

impl RateLimitConfig {
    /// Defaults for the per-IP limiter: several sessions may share one address.
    pub fn ip_default() -> Self {
        Self {
            max_requests: 30,
            ..Self::default()
        }
    }
}

/// Encryption envelope configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// 64 hex characters (raw key) or any passphrase (SHA-256 derived).
    pub key: String,

    /// Require the encrypted envelope on guarded endpoints even without
    /// the `X-Encrypted-Request` marker.
    pub require_encryption: bool,

    /// Accepted clock distance for request timestamps.
    pub max_age_ms: u64,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            require_encryption: true,
            max_age_ms: 300_000,
        }
    }
}

/// CSRF token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Reject guarded requests without a valid `X-CSRF-Token`.
    pub required: bool,

    /// Token lifetime in milliseconds.
    pub ttl_ms: u64,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            required: false,
            ttl_ms: 3_600_000,
        }
    }
}

/// How denylisted terms are matched against prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TermMatch {
    /// Case-insensitive substring match.
    #[default]
    Substring,
    /// Case-insensitive match on whole words only.
    WordBoundary,
}

/// Origin allow-list and prompt policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Allowed origins; empty or containing "*" allows every origin.
    pub allowed_origins: Vec<String>,

    /// Prompts are truncated to this many characters.
    pub max_prompt_chars: usize,

    /// Terms rejected in prompts.
    pub sensitive_terms: Vec<String>,

    /// Matching strategy for `sensitive_terms`.
    pub term_match: TermMatch,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_prompt_chars: 2000,
            sensitive_terms: Vec::new(),
            term_match: TermMatch::Substring,
        }
    }
}

/// Background cleanup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Enable the periodic sweep.
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.ip_rate_limit.max_requests, 30);
        assert_eq!(config.encryption.max_age_ms, 300_000);
        assert_eq!(config.security.max_prompt_chars, 2000);
        assert!(config.encryption.require_encryption);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GuardConfig = toml::from_str(
            r#"
            [rate_limit]
            max_requests = 5

            [security]
            allowed_origins = ["https://app.example.com"]
            term_match = "word_boundary"
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.ip_rate_limit.max_requests, 30);
        assert_eq!(config.security.term_match, TermMatch::WordBoundary);
        assert_eq!(config.security.allowed_origins.len(), 1);
    }
}
