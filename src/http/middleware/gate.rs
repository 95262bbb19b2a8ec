//! Gate middleware.
//! Runs the request gate and applies its decision to the axum request.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::request::RequestIdExt;
use crate::observability::metrics;
use crate::security::gate::RequestGate;

pub async fn gate_middleware(
    State(gate): State<Arc<RequestGate>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();

    let decision = gate
        .evaluate(req.method(), req.uri().path(), req.headers())
        .await;
    let outcome = decision.label();
    metrics::record_gate_decision(outcome);

    tracing::debug!(
        request_id = %req.request_id(),
        method = %method,
        path = %req.uri().path(),
        outcome,
        "Gate decision"
    );

    let response = match decision.into_result() {
        Ok(admitted) => {
            // Handlers read the caller through `Extension<CallerContext>`.
            if let Some(caller) = admitted.caller {
                req.extensions_mut().insert(caller);
            }
            let mut response = next.run(req).await;
            response.headers_mut().extend(admitted.headers);
            response
        }
        Err(rejection) => rejection,
    };

    metrics::record_bucket_count(gate.limiter().len());
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
