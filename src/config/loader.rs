//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then process environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<GuardConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GuardConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply deployment overrides read through `lookup`.
///
/// Recognised variables: `RATE_LIMIT_WINDOW` (ms), `RATE_LIMIT_MAX_REQUESTS`,
/// `IP_RATE_LIMIT_WINDOW` (ms), `IP_RATE_LIMIT_MAX_REQUESTS`, `ENCRYPTION_KEY`,
/// `ALLOWED_ORIGINS` (comma-separated, `*` allows all) and `ADMIN_API_KEY`.
pub fn apply_env_overrides<F>(config: &mut GuardConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("RATE_LIMIT_WINDOW") {
        config.rate_limit.window_ms = parse_number("RATE_LIMIT_WINDOW", &value)?;
    }
    if let Some(value) = lookup("RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.max_requests = parse_number("RATE_LIMIT_MAX_REQUESTS", &value)?;
    }
    if let Some(value) = lookup("IP_RATE_LIMIT_WINDOW") {
        config.ip_rate_limit.window_ms = parse_number("IP_RATE_LIMIT_WINDOW", &value)?;
    }
    if let Some(value) = lookup("IP_RATE_LIMIT_MAX_REQUESTS") {
        config.ip_rate_limit.max_requests = parse_number("IP_RATE_LIMIT_MAX_REQUESTS", &value)?;
    }
    if let Some(value) = lookup("ENCRYPTION_KEY") {
        config.encryption.key = value;
    }
    if let Some(value) = lookup("ALLOWED_ORIGINS") {
        config.security.allowed_origins = value
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(value) = lookup("ADMIN_API_KEY") {
        config.admin.api_key = value;
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}
