//! Endpoints served by the gateway itself.
//!
//! Catalog routes live in their own services; what is here is the public
//! surface (info, health, docs, key management notice) and `whoami` for
//! checking a key from the outside.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::server::AppState;
use crate::security::gate::CallerContext;

#[derive(Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: Value,
    pub note: &'static str,
}

pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    let policy = state.gate.policy();
    Json(ServiceInfo {
        message: "Factory Backend API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: json!({ "v1": "/v1", "docs": policy.docs_path }),
        note: "Internal manufacturing catalog and attributes",
    })
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Connectivity probe for the key store.
pub async fn db(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match state.gate.validator().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "message": "Key store reachable",
                "keys": state.key_store.len(),
                "timestamp": timestamp,
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Key store probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "Service unavailable",
                    "message": "Key store unreachable",
                    "timestamp": timestamp,
                })),
            )
        }
    }
}

/// Minimal OpenAPI document for the public surface.
pub async fn docs(State(state): State<AppState>) -> Json<Value> {
    let policy = state.gate.policy();
    let key_path = policy.key_management_path.as_str();
    Json(json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Factory Backend API",
            "description": "Internal manufacturing catalog and attributes API",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "components": {
            "securitySchemes": {
                "ApiKey": { "type": "apiKey", "in": "header", "name": "X-API-Key" }
            }
        },
        "tags": [
            { "name": "api-keys", "description": "API key management" },
            { "name": "internal-items", "description": "Internal catalog" },
            { "name": "attributes", "description": "Manufacturing attributes" },
        ],
        "paths": {
            "/health": { "get": { "summary": "Liveness" } },
            key_path: {
                "get": { "tags": ["api-keys"], "summary": "API key info" },
                "post": { "tags": ["api-keys"], "summary": "Not allowed at runtime" },
            },
            "/v1/whoami": {
                "get": { "summary": "Identity behind the presented key", "security": [{ "ApiKey": [] }] }
            },
        },
    }))
}

pub async fn api_keys_info() -> Json<Value> {
    Json(json!({
        "message": "API key management (admin only)",
        "hint": "Keys are provisioned through the gateway configuration",
    }))
}

pub async fn api_keys_create() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "Not allowed",
            "message": "API keys can only be created through configuration or operations tooling",
        })),
    )
}

pub async fn whoami(Extension(caller): Extension<CallerContext>) -> Json<CallerContext> {
    Json(caller)
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found", "message": "No route for this path" })),
    )
}
