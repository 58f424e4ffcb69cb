//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define relay metrics (forwards, failures, download bytes, sessions)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `relay_forward_requests_total` (counter): forwards by method, status
//! - `relay_forward_duration_seconds` (histogram): forward latency
//! - `relay_upstream_failures_total` (counter): failures by kind
//! - `relay_download_bytes_total` (counter): bytes streamed to callers
//! - `relay_active_sessions` (gauge): open WebSocket relay sessions
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Labels are low-cardinality: no target URLs

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_forward(method: &str, status: u16, start: Instant) {
    counter!(
        "relay_forward_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("relay_forward_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_failure(kind: &'static str) {
    counter!("relay_upstream_failures_total", "kind" => kind).increment(1);
}

pub fn record_download_bytes(bytes: u64) {
    counter!("relay_download_bytes_total").increment(bytes);
}

pub fn session_opened() {
    gauge!("relay_active_sessions").increment(1.0);
}

pub fn session_closed() {
    gauge!("relay_active_sessions").decrement(1.0);
}
