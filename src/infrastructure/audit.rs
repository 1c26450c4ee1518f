//! Logging-only audit sink, for deployments without an audit table.

use crate::domain::{AuditEvent, AuditSink, AuditSinkPtr};
use std::sync::Arc;

pub struct TracingAuditSink;

#[async_trait::async_trait]
impl AuditSink for TracingAuditSink {
    // ---
    async fn record(&self, event: AuditEvent) {
        // ---
        tracing::info!(
            kind = %event.kind,
            entity_id = %event.entity_id,
            actor_id = ?event.actor_id,
            "{}",
            event.description
        );
    }
}

/// Creates the logging-only audit sink.
pub fn create_tracing_audit_sink() -> AuditSinkPtr {
    // ---
    Arc::new(TracingAuditSink)
}
