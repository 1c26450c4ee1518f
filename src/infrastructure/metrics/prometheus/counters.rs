use metrics::{counter, histogram};
use std::time::Instant;

/// Increment the counter for issued signing challenges.
pub fn increment_challenge_issued() {
    counter!("signing_challenges_issued_total").increment(1);
}

/// Increment the counter for successfully signed invoices.
pub fn increment_invoice_signed() {
    counter!("invoices_signed_total").increment(1);
}

/// Increment the failure counter, labelled by stable error code.
pub fn increment_sign_failure(code: &str) {
    counter!("sign_failures_total", "code" => code.to_string()).increment(1);
}

/// Track HTTP request latency using a histogram.
pub fn track_http_request(start: Instant) {
    let elapsed = start.elapsed();
    histogram!("http_request_duration_seconds").record(elapsed);
}
