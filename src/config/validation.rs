//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and
//! referential integrity. Every problem is reported, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// Routes with fixed handlers. Configurable paths are public prefixes, so
/// none of these may start with one.
const RESERVED_PATHS: [&str; 3] = ["/health", "/db", "/v1/whoami"];

/// Key-protected namespace; no public prefix may reach into it.
const PRIVATE_PREFIX: &str = "/v1";

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn covers_private_namespace(path: &str) -> bool {
    path.strip_prefix(PRIVATE_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    for (i, origin) in config.cors.allowed_origins.iter().enumerate() {
        if origin.is_empty() || origin.chars().any(char::is_whitespace) {
            errors.push(ValidationError::new(
                format!("cors.allowed_origins[{i}]"),
                format!("'{origin}' is not a valid origin"),
            ));
        }
    }

    if config.auth.default_rate_limit == 0 {
        errors.push(ValidationError::new("auth.default_rate_limit", "must be greater than 0"));
    }
    if config.auth.validation_timeout_ms == 0 {
        errors.push(ValidationError::new("auth.validation_timeout_ms", "must be greater than 0"));
    }

    let mut ids = HashSet::new();
    let mut secrets = HashSet::new();
    for (i, key) in config.auth.keys.iter().enumerate() {
        if key.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("auth.keys[{i}].id"), "must not be empty"));
        } else if !ids.insert(key.id.as_str()) {
            errors.push(ValidationError::new(
                format!("auth.keys[{i}].id"),
                format!("duplicate key id '{}'", key.id),
            ));
        }
        // Secrets are never echoed into error messages.
        if key.key.is_empty() {
            errors.push(ValidationError::new(format!("auth.keys[{i}].key"), "must not be empty"));
        } else if !secrets.insert(key.key.as_str()) {
            errors.push(ValidationError::new(
                format!("auth.keys[{i}].key"),
                "same secret is assigned to another key",
            ));
        }
        if key.rate_limit == Some(0) {
            errors.push(ValidationError::new(
                format!("auth.keys[{i}].rate_limit"),
                "must be greater than 0 when set",
            ));
        }
    }

    for (field, path) in [
        ("paths.docs_path", &config.paths.docs_path),
        ("paths.key_management_path", &config.paths.key_management_path),
    ] {
        if !path.starts_with('/') || path.len() < 2 {
            errors.push(ValidationError::new(field, format!("'{path}' must be an absolute path below '/'")));
        } else if RESERVED_PATHS.iter().any(|fixed| fixed.starts_with(path.as_str())) {
            errors.push(ValidationError::new(field, format!("'{path}' would cover a route served by the gateway itself")));
        } else if covers_private_namespace(path) {
            errors.push(ValidationError::new(field, format!("'{path}' would make {PRIVATE_PREFIX}/ public")));
        }
    }
    if config.paths.docs_path == config.paths.key_management_path {
        errors.push(ValidationError::new(
            "paths.key_management_path",
            "must differ from paths.docs_path",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ApiKeyConfig, TlsConfig};

    fn key(id: &str, secret: &str) -> ApiKeyConfig {
        ApiKeyConfig {
            id: id.to_string(),
            name: String::new(),
            key: secret.to_string(),
            rate_limit: None,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.auth.default_rate_limit = 0;
        config.timeouts.request_secs = 0;
        config.paths.docs_path = "swagger".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "auth.default_rate_limit",
                "paths.docs_path",
                "timeouts.request_secs",
            ]
        );
    }

    #[test]
    fn rejects_paths_that_shadow_fixed_routes() {
        let mut config = GatewayConfig::default();
        config.paths.docs_path = "/health".into();
        config.paths.key_management_path = "/health".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["paths.docs_path", "paths.key_management_path", "paths.key_management_path"]
        );
    }

    #[test]
    fn rejects_public_prefixes_over_private_routes() {
        for path in ["/v1", "/v1/", "/v1/items", "/v", "/d", "/hea"] {
            let mut config = GatewayConfig::default();
            config.paths.key_management_path = path.into();
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors.len(), 1, "{path}");
            assert_eq!(errors[0].field, "paths.key_management_path", "{path}");
        }

        for path in ["/", ""] {
            let mut config = GatewayConfig::default();
            config.paths.docs_path = path.into();
            assert!(validate_config(&config).is_err(), "{path:?}");
        }

        let mut config = GatewayConfig::default();
        config.paths.docs_path = "/v1docs".into();
        config.paths.key_management_path = "/keys".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_duplicate_ids_and_secrets() {
        let mut config = GatewayConfig::default();
        config.auth.keys = vec![key("1", "a"), key("1", "b"), key("2", "a")];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "auth.keys[1].id");
        assert_eq!(errors[1].field, "auth.keys[2].key");
        assert!(!errors[1].to_string().contains("'a'"));
    }

    #[test]
    fn rejects_blank_origins_and_tls_paths() {
        let mut config = GatewayConfig::default();
        config.cors.allowed_origins = vec!["https://ok.example".into(), "bad origin".into()];
        config.listener.tls = Some(TlsConfig {
            cert_path: String::new(),
            key_path: "key.pem".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.clone()).collect();
        assert!(fields.contains(&"listener.tls.cert_path".to_string()));
        assert!(fields.contains(&"cors.allowed_origins[1]".to_string()));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = GatewayConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
