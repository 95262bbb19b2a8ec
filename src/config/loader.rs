//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: '{value}'")]
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

/// Load a TOML file, apply process environment overrides, then validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GatewayConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults and the process environment only.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply deployment environment variables on top of a parsed config.
///
/// | Variable             | Field                      |
/// |----------------------|----------------------------|
/// | `CORS_ORIGINS`       | `cors.allowed_origins`     |
/// | `API_KEY`            | `auth.legacy_api_key`      |
/// | `DEFAULT_RATE_LIMIT` | `auth.default_rate_limit`  |
/// | `PORT`               | port of `listener.bind_address` |
/// | `PERMIT_API_URL`     | `audit.url`                |
/// | `PERMIT_API_KEY`     | `audit.api_key`            |
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(origins) = lookup("CORS_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(key) = lookup("API_KEY") {
        config.auth.legacy_api_key = key;
    }

    if let Some(raw) = lookup("DEFAULT_RATE_LIMIT") {
        config.auth.default_rate_limit = raw.trim().parse().map_err(|_| ConfigError::Env {
            var: "DEFAULT_RATE_LIMIT",
            value: raw.clone(),
        })?;
    }

    if let Some(raw) = lookup("PORT") {
        let port: u16 = raw.trim().parse().map_err(|_| ConfigError::Env {
            var: "PORT",
            value: raw.clone(),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }

    if let Some(url) = lookup("PERMIT_API_URL") {
        config.audit.url = url.trim_end_matches('/').to_string();
    }

    if let Some(key) = lookup("PERMIT_API_KEY") {
        config.audit.api_key = key;
    }

    Ok(())
}
