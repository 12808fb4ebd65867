//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, backend
//! - `proxy_request_duration_seconds` (histogram): time to response headers
//! - `proxy_upstream_attempt_failures_total` (counter): transport failures per backend
//! - `proxy_backend_health` (gauge): 1=healthy, 0=unhealthy
//! - `proxy_backend_outstanding` (gauge): in-flight requests per backend
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::Label;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
        Label::new("backend", backend.to_string()),
    ];
    metrics::counter!("proxy_requests_total", labels.clone()).increment(1);
    metrics::histogram!("proxy_request_duration_seconds", labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_attempt_failure(backend: &str) {
    metrics::counter!("proxy_upstream_attempt_failures_total", "backend" => backend.to_string())
        .increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    metrics::gauge!("proxy_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn set_outstanding(backend: &str, outstanding: usize) {
    metrics::gauge!("proxy_backend_outstanding", "backend" => backend.to_string())
        .set(outstanding as f64);
}

/// Zero the per-backend gauges of a removed backend.
pub fn clear_backend(backend: &str) {
    record_backend_health(backend, false);
    set_outstanding(backend, 0);
}
