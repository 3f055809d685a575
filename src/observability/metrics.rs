//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, RPC errors)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by verb, route, status
//! - `gateway_request_duration_seconds` (histogram): latency by verb, route
//! - `gateway_rpc_errors_total` (counter): failed calls by RPC method, code
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Route label is the template, never the raw path (bounded cardinality)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Label used when no route matched.
pub const UNMATCHED_ROUTE: &str = "none";

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished HTTP request.
pub fn record_request(verb: &str, route: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => verb.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => verb.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one failed RPC call.
pub fn record_rpc_error(rpc: &str, code: &str) {
    counter!(
        "gateway_rpc_errors_total",
        "rpc" => rpc.to_string(),
        "code" => code.to_string()
    )
    .increment(1);
}
