//! Metrics collection and exposition.
//!
//! # Metrics
//! - `redirector_redirects_total` (counter): redirects by method, status;
//!   methods outside the standard set are labelled `OTHER`
//! - `redirector_affinity_lookups_total` (counter): cache lookups by result
//! - `redirector_affinity_evictions_total` (counter): capacity evictions
//! - `redirector_affinity_cache_size` (gauge): current cache entries
//! - `redirector_active_connections` (gauge): open client connections
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use axum::http::Method;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Label value for `method`. Extension methods share `OTHER` so clients
/// cannot mint new series.
pub fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::OPTIONS => "OPTIONS",
        Method::PATCH => "PATCH",
        Method::TRACE => "TRACE",
        Method::CONNECT => "CONNECT",
        _ => "OTHER",
    }
}

pub fn record_redirect(method: &Method, status: u16) {
    metrics::counter!(
        "redirector_redirects_total",
        "method" => method_label(method),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_affinity_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("redirector_affinity_lookups_total", "result" => result).increment(1);
}

pub fn record_affinity_eviction() {
    metrics::counter!("redirector_affinity_evictions_total").increment(1);
}

pub fn record_cache_size(len: usize) {
    metrics::gauge!("redirector_affinity_cache_size").set(len as f64);
}

pub fn record_active_connections(count: u64) {
    metrics::gauge!("redirector_active_connections").set(count as f64);
}
