//! Audit trail for mutations.
//!
//! # Data Flow
//! ```text
//! mutation (API key set reloaded, catalog write)
//!     → AuditLogEntry (types.rs)
//!     → AuditClient::emit (client.rs) spawns POST {url}/v1/audit-logs
//!     → failures logged and counted, never returned to the caller
//! ```

pub mod client;
pub mod types;

pub use client::{AuditClient, AuditError};
pub use types::{AuditAction, AuditLogEntry};
