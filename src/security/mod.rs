//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (CORS + hardening headers, always)
//!     → gate.rs (preflight, public/private path split)
//!     → api_keys.rs (X-API-Key lookup, bounded by a timeout)
//!     → rate_limit.rs (fixed-window quota per key identity)
//!     → Pass to handler, or reject with 401 / 429
//! ```
//!
//! # Design Decisions
//! - Every response carries the CORS and security headers, rejections too
//! - Key store failures reject the request; they never take the gate down
//! - Rate-limit state lives in an injected store, not a global

pub mod api_keys;
pub mod clock;
pub mod gate;
pub mod headers;
pub mod messages;
pub mod rate_limit;

pub use api_keys::{ApiKeyIdentity, ApiKeyValidator, InMemoryKeyStore, KeyValidation, ValidatorError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{CallerContext, GateDecision, GateError, GateOutcome, GatePolicy, PathClass, RequestGate};
pub use messages::MessageLanguage;
pub use rate_limit::{FixedWindowLimiter, RateLimitStore, WINDOW_MS};
