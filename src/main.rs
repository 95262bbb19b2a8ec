//! Factory API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net (TCP / TLS)
//!                      │
//!                      ▼
//!                    http server ── request id, trace, timeout
//!                      │
//!                      ▼
//!                    security gate
//!                      │  headers → preflight → path class → key → quota
//!                      ▼
//!                    handlers (public surface, whoami, 404)
//!
//!     Cross-cutting: config (file + env, hot reload), observability
//!     (tracing, Prometheus), audit (key changes), lifecycle (signals)
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use factory_gateway::config::{load_config, load_from_env, watcher::ConfigWatcher, GatewayConfig};
use factory_gateway::lifecycle::{signals, Shutdown};
use factory_gateway::net::tls::load_tls_config;
use factory_gateway::observability::{logging, metrics};
use factory_gateway::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "factory-gateway", version, about = "API key and rate-limit gate for the factory backend")]
struct Args {
    /// TOML config file; watched for changes. Without it, defaults plus
    /// environment variables are used.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "factory-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        keys = config.auth.keys.len(),
        origins = config.cors.allowed_origins.len(),
        default_rate_limit = config.auth.default_rate_limit,
        legacy_key = !config.auth.legacy_api_key.is_empty(),
        audit = config.audit.is_enabled(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the life of the process.
    let (_watcher, config_updates) = watch_config(args.config.as_deref());

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let tls = match &config.listener.tls {
        Some(tls) => Some(load_tls_config(tls).await?),
        None => None,
    };
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config);

    let mut serve: Pin<Box<dyn Future<Output = std::io::Result<()>>>> = match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            Box::pin(server.run_tls(addr, tls, config_updates, server_shutdown))
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            Box::pin(server.run(listener, config_updates, server_shutdown))
        }
    };

    let finished = tokio::select! {
        result = &mut serve => Some(result),
        reason = signals::wait_for_signal() => {
            shutdown.trigger(reason);
            None
        }
    };
    match finished {
        Some(result) => result?,
        // Drain in-flight requests.
        None => serve.await?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn watch_config(
    path: Option<&Path>,
) -> (Option<notify::RecommendedWatcher>, mpsc::UnboundedReceiver<GatewayConfig>) {
    let Some(path) = path else {
        let (_tx, rx) = mpsc::unbounded_channel();
        return (None, rx);
    };

    let (watcher, rx) = ConfigWatcher::new(path);
    match watcher.run() {
        Ok(handle) => (Some(handle), rx),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Config hot reload disabled");
            (None, rx)
        }
    }
}
