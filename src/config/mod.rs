//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, apply env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new revision
//!     → validation.rs validates
//!     → HttpServer swaps gate policy and key set atomically
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Environment variables override the file (deployment knobs)
//! - The rate-limit window is fixed and not configurable

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    ApiKeyConfig, AuditConfig, AuthConfig, CorsConfig, GatewayConfig, ListenerConfig, LogFormat,
    MessageLanguage, ObservabilityConfig, PathsConfig, TlsConfig,
};
