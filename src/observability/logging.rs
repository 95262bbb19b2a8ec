//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level. JSON output is meant for
//! production log shipping, pretty output for local runs.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Default directives when `RUST_LOG` is unset.
pub fn default_directives(level: &str) -> String {
    format!("factory_gateway={level},tower_http={level},warn")
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}
