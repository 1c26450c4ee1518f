// src/lib.rs
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};

use handlers::{health_check, metrics_handler, root_handler};
use redis::Client;
use signing::{ArtifactRenderer, AssertionVerifier, SigningService};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::sync::Arc;

// Public exports (visible outside this module)
pub mod domain;
pub mod signing;

// Internal-only exports (sibling access within this module)
mod app_state;
mod config;
mod handlers;
mod infrastructure;

pub(crate) use app_state::AppState;
pub use config::*;

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    create_noop_metrics, // ---
    create_postgres_audit_sink,
    create_postgres_credential_repository,
    create_postgres_document_repository,
    create_prom_metrics,
    create_redis_challenge_store,
    create_tracing_audit_sink,
};
pub use infrastructure::memory;

/// Build the HTTP router with metrics implementation determined by environment variables.
pub fn create_router() -> Result<Router> {
    // ---
    // Load all configuration from environment
    let config = AppConfig::from_env()?;

    // Determine metrics implementation from environment
    let metrics_type = env::var("INVOICE_METRICS_TYPE").unwrap_or_else(|_| "noop".to_string());
    let metrics = if metrics_type == "prom" {
        create_prom_metrics()?
    } else {
        create_noop_metrics()?
    };

    tracing_subscriber::fmt::try_init().ok(); // Ignores if already initialized

    // Create infrastructure dependencies. The pool connects lazily so the
    // service can start before the database accepts connections.
    let redis_client = Client::open(config.redis.url.clone())?;
    let pool = PgPoolOptions::new()
        .acquire_timeout(config.database.acquire_timeout)
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .connect_lazy(&config.database.database_url)?;

    let documents: domain::DocumentRepositoryPtr =
        Arc::new(create_postgres_document_repository(pool.clone()));
    let credentials: domain::CredentialRepositoryPtr =
        Arc::new(create_postgres_credential_repository(pool.clone()));
    let audit: domain::AuditSinkPtr = Arc::new(create_postgres_audit_sink(pool));
    let challenges = create_redis_challenge_store(redis_client.clone());

    let verifier = AssertionVerifier::new(&config.relying_party.rp_id, &config.relying_party.origin);
    let signing = Arc::new(SigningService::new(
        challenges,
        verifier,
        documents.clone(),
        credentials,
        audit,
        Arc::new(ArtifactRenderer::new()),
        config.redis.challenge_ttl.as_secs(),
    ));

    // Build application state with all dependencies
    let app_state = AppState::new(redis_client, metrics, documents, signing);

    // Build router
    //
    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/invoices", post(handlers::create_invoice))
        .nest(
            "/invoices",
            Router::new()
                .route("/{id}", get(handlers::get_invoice))
                .route("/{id}/cancel", post(handlers::cancel_invoice))
                .route("/{id}/sign", post(handlers::sign_finish))
                .route("/{id}/artifact", get(handlers::get_artifact)),
        )
        .nest(
            "/signing",
            Router::new().route("/challenge", post(handlers::challenge_start)),
        )
        .with_state(app_state);

    Ok(router)
}
