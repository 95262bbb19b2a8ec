//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_decisions_total` (counter): gate outcomes by `outcome`
//! - `gate_rate_limited_total` (counter): 429 rejections
//! - `gate_legacy_key_total` (counter): requests admitted with the shared legacy key
//! - `gate_validator_failures_total` (counter): key store errors and timeouts
//! - `gate_rate_limit_buckets` (gauge): tracked identities
//! - `http_request_duration_seconds` (histogram): latency by method and status
//! - `audit_events_total` (counter): audit deliveries by `result`
//! - `config_reloads_total` (counter): reload attempts by `result`
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_gate_decision(outcome: &'static str) {
    counter!("gate_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limited() {
    counter!("gate_rate_limited_total").increment(1);
}

pub fn record_legacy_key() {
    counter!("gate_legacy_key_total").increment(1);
}

pub fn record_validator_failure() {
    counter!("gate_validator_failures_total").increment(1);
}

pub fn record_bucket_count(count: usize) {
    gauge!("gate_rate_limit_buckets").set(count as f64);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_audit_event(result: &'static str) {
    counter!("audit_events_total", "result" => result).increment(1);
}

pub fn record_config_reload(result: &'static str) {
    counter!("config_reloads_total", "result" => result).increment(1);
}
