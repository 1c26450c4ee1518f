use std::sync::Arc;
use std::time::Instant;

/// Abstraction for application metrics (counters, histograms).
pub trait Metrics: Send + Sync + 'static {
    // ---
    /// Render current metrics in Prometheus text format.
    fn render(&self) -> String;

    /// Record a "challenge issued" event.
    fn record_challenge_issued(&self);

    /// Record a successful invoice signing.
    fn record_invoice_signed(&self);

    /// Record a failed signing attempt, labelled by stable error code.
    fn record_sign_failure(&self, code: &str);

    /// Record HTTP request duration and labels.
    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16);
}

/// Type alias for any backend that implements Metrics.
pub type MetricsPtr = Arc<dyn Metrics>;
