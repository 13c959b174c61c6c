//! Metrics collection and exposition.
//!
//! # Metrics
//! - `medisync_requests_total` (counter): requests by method, status
//! - `medisync_request_duration_seconds` (histogram): handler latency
//! - `medisync_access_denied_total` (counter): rejections by reason
//! - `medisync_list_queries_total` (counter): list calls by collection
//! - `medisync_ws_clients` (gauge): open notification sockets
//! - `medisync_notifications_published_total` (counter): by event
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Labels stay low-cardinality (no IPs, no ids)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint. Must run inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "medisync_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("medisync_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_access_denied(reason: &'static str) {
    ::metrics::counter!("medisync_access_denied_total", "reason" => reason).increment(1);
}

pub fn record_list_query(collection: &str) {
    ::metrics::counter!("medisync_list_queries_total", "collection" => collection.to_string())
        .increment(1);
}

pub fn ws_client_connected() {
    ::metrics::gauge!("medisync_ws_clients").increment(1.0);
}

pub fn ws_client_disconnected() {
    ::metrics::gauge!("medisync_ws_clients").decrement(1.0);
}

pub fn record_notification(event: &str) {
    ::metrics::counter!("medisync_notifications_published_total", "event" => event.to_string())
        .increment(1);
}
