//! Metrics collection and exposition.
//!
//! # Metrics
//! - `genguard_requests_admitted_total` (counter): admitted requests by endpoint
//! - `genguard_requests_rejected_total` (counter): rejections by error code
//! - `genguard_cleanup_evicted_total` (counter): evictions by kind
//! - `genguard_tracked_keys` (gauge): live limiter records by scope
//!
//! # Design Decisions
//! - Recorder is global; without `init_metrics` every update is a no-op
//! - Label values are bounded (endpoints, error codes, scopes)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::security::middleware::CleanupReport;

/// Install the Prometheus recorder and its scrape listener on `addr`.
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admitted(endpoint: &str) {
    metrics::counter!("genguard_requests_admitted_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_rejected(code: &'static str) {
    metrics::counter!("genguard_requests_rejected_total", "code" => code).increment(1);
}

pub fn record_cleanup(report: &CleanupReport) {
    for (kind, evicted) in [
        ("session", report.sessions),
        ("ip", report.ips),
        ("csrf", report.csrf_tokens),
    ] {
        if evicted > 0 {
            metrics::counter!("genguard_cleanup_evicted_total", "kind" => kind).increment(evicted as u64);
        }
    }
}

pub fn record_tracked_keys(sessions: usize, ips: usize) {
    metrics::gauge!("genguard_tracked_keys", "scope" => "session").set(sessions as f64);
    metrics::gauge!("genguard_tracked_keys", "scope" => "ip").set(ips as f64);
}
