//! Request ID assignment and propagation.
//!
//! An incoming `x-request-id` is kept; otherwise a UUID v4 is generated.
//! The ID is copied onto the response and recorded on the request span.

use axum::http::{HeaderName, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Layer that assigns an ID to requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid)
}

/// Layer that copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID.clone())
}

/// Read access to the request ID header.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers()
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}
