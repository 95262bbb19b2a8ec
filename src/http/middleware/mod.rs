//! Axum middleware wrapping the security subsystem.

pub mod gate;

pub use gate::gate_middleware;
