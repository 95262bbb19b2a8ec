//! Network layer subsystem.
//!
//! Plain TCP is served straight through `axum::serve`; when the listener
//! config carries a `tls` section, tls.rs loads the certificate pair and
//! the server switches to `axum_server` with rustls.

pub mod tls;
