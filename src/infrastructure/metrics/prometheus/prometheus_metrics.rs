//! Prometheus metrics implementation.
//!
//! Concrete implementation of the `Metrics` trait using the Prometheus
//! text format. It delegates to utility functions in sibling modules
//! (`counters.rs`, `recorder.rs`) which handle the actual metrics
//! collection via the global `metrics` crate registry.

use crate::domain::Metrics;
use std::time::Instant;

/// Prometheus-based metrics implementation.
///
/// Intentionally empty: metrics are registered through the global registry
/// via `counter!()` / `histogram!()`, and the global PrometheusHandle in
/// `recorder.rs` manages collection and rendering.
pub struct PrometheusMetrics {
    // Empty - uses global metrics registry pattern
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        tracing::info!("Creating Prometheus metrics");
        PrometheusMetrics {}
    }
}

impl Metrics for PrometheusMetrics {
    fn render(&self) -> String {
        super::render_metrics()
    }

    fn record_challenge_issued(&self) {
        super::increment_challenge_issued();
    }

    fn record_invoice_signed(&self) {
        super::increment_invoice_signed();
    }

    fn record_sign_failure(&self, code: &str) {
        super::increment_sign_failure(code);
    }

    fn record_http_request(&self, start: Instant, _path: &str, _method: &str, _status: u16) {
        tracing::debug!("Recording HTTP request duration");
        super::track_http_request(start);
    }
}
