//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, layers, background tasks)
//!     → request.rs (assign and propagate request ID)
//!     → middleware/gate.rs (CORS + security headers, preflight, 401, 429)
//!     → handlers.rs (public endpoints, whoami, 404 fallback)
//!     → Send to client with the gate's headers attached
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer, Reloader};
