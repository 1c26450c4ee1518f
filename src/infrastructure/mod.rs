mod audit;
mod challenges;
mod database;
pub mod memory;
pub mod metrics;

// Re-export the factory functions for easy access
pub use audit::create_tracing_audit_sink;
pub use challenges::{create_redis_challenge_store, RedisChallengeStore};
pub use database::{
    create_postgres_audit_sink, create_postgres_credential_repository,
    create_postgres_document_repository,
};
pub use metrics::{create_noop_metrics, create_prom_metrics};
