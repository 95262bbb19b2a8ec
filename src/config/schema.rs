//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// API key authentication.
    pub auth: AuthConfig,

    /// Rate limit table maintenance.
    pub rate_limit: RateLimitConfig,

    /// Public path layout.
    pub paths: PathsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Outbound audit-log delivery.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins echoed back in `Access-Control-Allow-Origin`.
    /// Empty means any origin is echoed.
    pub allowed_origins: Vec<String>,
}

/// API key authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared static key accepted without identity or rate limiting.
    /// Empty disables the legacy path.
    pub legacy_api_key: String,

    /// Quota applied to keys without their own `rate_limit`.
    pub default_rate_limit: u32,

    /// Upper bound on a single key-store lookup.
    pub validation_timeout_ms: u64,

    /// Keys served by the built-in key store.
    pub keys: Vec<ApiKeyConfig>,

    /// Language of the `error`/`message` texts in 401 and 429 bodies.
    pub message_language: MessageLanguage,
}

/// Language of client-facing rejection messages.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageLanguage {
    #[default]
    En,
    Es,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            legacy_api_key: String::new(),
            default_rate_limit: 100,
            validation_timeout_ms: 2000,
            keys: Vec::new(),
            message_language: MessageLanguage::En,
        }
    }
}

/// A single API key entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ApiKeyConfig {
    /// Stable identifier; rate-limit buckets are keyed on it.
    pub id: String,

    /// Human-readable owner of the key.
    #[serde(default)]
    pub name: String,

    /// The secret presented in `X-API-Key`.
    pub key: String,

    /// Requests per minute. Falls back to `auth.default_rate_limit`.
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

/// Rate limit table maintenance.
///
/// The window length is fixed at 60 seconds and deliberately not exposed here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// How often expired buckets are dropped. 0 disables purging.
    pub purge_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            purge_interval_secs: 300,
        }
    }
}

/// Paths that are reachable without an API key.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// API documentation root. Also receives `X-Robots-Tag: noindex`.
    pub docs_path: String,

    /// Key management endpoints.
    pub key_management_path: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            docs_path: "/swagger".to_string(),
            key_management_path: "/api-keys".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Audit-log delivery. Disabled unless both `url` and `api_key` are set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Base URL of the audit service; entries go to `{url}/v1/audit-logs`.
    pub url: String,

    /// Key sent as `X-API-Key` to the audit service.
    pub api_key: String,

    /// Per-delivery timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: 5,
        }
    }
}

impl AuditConfig {
    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty() && !self.api_key.is_empty()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
