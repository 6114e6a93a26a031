//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_backend_ready` (gauge): 1=connected, 0=not, by backend
//! - `gateway_backend_reconnects_total` (counter): by backend
//! - `gateway_readiness_rejections_total` (counter): by first unready backend
//! - `gateway_socket_timeouts_total` (counter): idle connections closed
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op
//! - The Prometheus exporter is optional and off by default

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::backend::BackendKind;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "metrics endpoint listening");
    Ok(())
}

pub fn record_request(route: &str, status: u16, elapsed: Duration) {
    ::metrics::counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_backend_ready(kind: BackendKind, ready: bool) {
    ::metrics::gauge!("gateway_backend_ready", "backend" => kind.as_str())
        .set(if ready { 1.0 } else { 0.0 });
}

pub fn record_reconnect(kind: BackendKind) {
    ::metrics::counter!("gateway_backend_reconnects_total", "backend" => kind.as_str())
        .increment(1);
}

pub fn record_readiness_rejection(kind: BackendKind) {
    ::metrics::counter!("gateway_readiness_rejections_total", "backend" => kind.as_str())
        .increment(1);
}

pub fn record_socket_timeout() {
    ::metrics::counter!("gateway_socket_timeouts_total").increment(1);
}
