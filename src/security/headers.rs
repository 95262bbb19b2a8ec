//! CORS and security response headers.
//!
//! Pure functions of request metadata. They are attached to every response,
//! including preflights and rejections.
//!
//! The CORS origin policy is lenient: a non-matching origin is answered with
//! the first configured origin rather than rejected. Browsers then refuse the
//! response, but the server itself never blocks on origin.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const ALLOW_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-API-Key";
pub const HSTS: &str = "max-age=63072000; includeSubDomains; preload";

pub static X_ROBOTS_TAG: HeaderName = HeaderName::from_static("x-robots-tag");

/// Build the CORS headers for a request with the given `Origin`.
pub fn cors_headers(origin: Option<&str>, allowed_origins: &[String]) -> HeaderMap {
    let origin = origin.filter(|o| !o.is_empty());
    let is_allowed = origin.is_some_and(|o| {
        allowed_origins.is_empty() || allowed_origins.iter().any(|allowed| allowed == o)
    });

    let chosen = match origin {
        Some(o) if is_allowed => o,
        _ => allowed_origins.first().map(String::as_str).unwrap_or("*"),
    };
    let allow_origin =
        HeaderValue::from_str(chosen).unwrap_or_else(|_| HeaderValue::from_static("*"));

    let mut headers = HeaderMap::with_capacity(4);
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers
}

/// Build the transport and framing hardening headers.
pub fn security_headers(is_docs_path: bool) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(5);
    headers.insert(STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    if is_docs_path {
        headers.insert(X_ROBOTS_TAG.clone(), HeaderValue::from_static("noindex"));
    }
    headers
}
