//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the gate (key store, rate limiter, clock) from config
//! - Create the Axum router with the public endpoints
//! - Wire up middleware (request ID, tracing, timeout, gate)
//! - Apply config revisions to the running gate
//! - Purge expired rate-limit buckets in the background
//! - Serve over plain TCP or TLS with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::audit::{AuditAction, AuditClient, AuditLogEntry};
use crate::config::GatewayConfig;
use crate::http::handlers;
use crate::http::middleware::gate_middleware;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::observability::metrics;
use crate::security::api_keys::{InMemoryKeyStore, KeyChanges};
use crate::security::clock::{Clock, SystemClock};
use crate::security::gate::{GatePolicy, RequestGate};
use crate::security::rate_limit::FixedWindowLimiter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub key_store: Arc<InMemoryKeyStore>,
    pub audit: AuditClient,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    gate: Arc<RequestGate>,
    key_store: Arc<InMemoryKeyStore>,
    audit: AuditClient,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`HttpServer::new`] with an explicit time source.
    pub fn with_clock(config: GatewayConfig, clock: Arc<dyn Clock>) -> Self {
        let key_store = Arc::new(
            InMemoryKeyStore::from_config(&config.auth.keys)
                .with_language(config.auth.message_language),
        );
        let limiter = Arc::new(FixedWindowLimiter::new());
        let gate = Arc::new(RequestGate::new(
            GatePolicy::from_config(&config),
            key_store.clone(),
            limiter,
            clock,
        ));

        let audit = AuditClient::from_config(&config.audit).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Audit client unavailable, audit logging disabled");
            AuditClient::disabled()
        });

        let state = AppState {
            gate: gate.clone(),
            key_store: key_store.clone(),
            audit: audit.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            gate,
            key_store,
            audit,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The gate wraps the fallback too, so unknown private paths still
    /// answer 401 before 404.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let gate = state.gate.clone();

        Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/db", get(handlers::db))
            .route(&config.paths.docs_path, get(handlers::docs))
            .route(
                &config.paths.key_management_path,
                get(handlers::api_keys_info).post(handlers::api_keys_create),
            )
            .route("/v1/whoami", get(handlers::whoami))
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(middleware::from_fn_with_state(gate, gate_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %req.request_id(),
                    method = %req.method(),
                    path = %req.uri().path(),
                )
            }))
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn gate(&self) -> &Arc<RequestGate> {
        &self.gate
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, keys = self.key_store.len(), "HTTP server starting");

        self.spawn_background(config_updates, &shutdown);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, keys = self.key_store.len(), "HTTPS server starting");

        self.spawn_background(config_updates, &shutdown);

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drain.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    fn spawn_background(
        &self,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: &broadcast::Receiver<()>,
    ) {
        let reloader = Reloader {
            gate: self.gate.clone(),
            key_store: self.key_store.clone(),
            audit: self.audit.clone(),
        };
        tokio::spawn(reloader.run(config_updates, shutdown.resubscribe()));

        let every = self.config.rate_limit.purge_interval_secs;
        if every > 0 {
            tokio::spawn(purge_buckets(
                self.gate.clone(),
                Duration::from_secs(every),
                shutdown.resubscribe(),
            ));
        }
    }
}

/// Applies validated config revisions to the running gate.
///
/// CORS origins, legacy key, default quota, validation timeout and the key
/// set change live. Listener, routes (docs and key management paths included),
/// message language and audit target need a restart.
pub struct Reloader {
    pub gate: Arc<RequestGate>,
    pub key_store: Arc<InMemoryKeyStore>,
    pub audit: AuditClient,
}

impl Reloader {
    async fn run(
        self,
        mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(config) => {
                        self.apply(&config);
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Config reloader stopped");
    }

    /// Swap in the new policy and key set; audit every key change.
    pub fn apply(&self, config: &GatewayConfig) -> KeyChanges {
        let mut policy = GatePolicy::from_config(config);
        if policy.pin_startup_fields(&self.gate.policy()) {
            tracing::warn!(
                docs_path = %config.paths.docs_path,
                key_management_path = %config.paths.key_management_path,
                "Path or message language changes need a restart; keeping current values"
            );
        }
        self.gate.update_policy(policy);
        let changes = self.key_store.reload(&config.auth.keys);

        tracing::info!(
            keys = self.key_store.len(),
            created = changes.created.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            origins = config.cors.allowed_origins.len(),
            "Applied config revision"
        );

        let audited = [
            (AuditAction::Create, &changes.created),
            (AuditAction::Update, &changes.updated),
            (AuditAction::Delete, &changes.deleted),
        ];
        for (action, ids) in audited {
            for id in ids {
                let mut entry = AuditLogEntry::new(action, "api_key", id.as_str())
                    .with_metadata(json!({ "source": "config_reload" }));
                if let Some(key) = config.auth.keys.iter().find(|k| &k.id == id) {
                    entry = entry.with_changes(json!({ "name": key.name, "rateLimit": key.rate_limit }));
                }
                self.audit.emit(entry);
            }
        }

        changes
    }
}

async fn purge_buckets(
    gate: Arc<RequestGate>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = gate.clock().now_millis();
                let removed = gate.limiter().purge_expired(now);
                let remaining = gate.limiter().len();
                metrics::record_bucket_count(remaining);
                if removed > 0 {
                    tracing::debug!(removed, remaining, "Purged expired rate-limit buckets");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
