//! Factory API gateway library.
//!
//! Puts a request gate in front of the factory backend: CORS and security
//! headers on every response, OPTIONS preflight, API key authentication
//! and a per-key fixed-window rate limit.

pub mod audit;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::RequestGate;
