//! Application state management.
//!
//! Defines the shared state structure passed to all Axum handlers via the
//! `State` extractor: the document repository, the signing service, the
//! metrics implementation, and the Redis client used for health checks.
//!
//! The state is designed to be cheaply cloneable (using `Arc` internally
//! where needed) so it can be passed efficiently to each request handler
//! without expensive copying of resources.

use crate::domain::{DocumentRepositoryPtr, MetricsPtr};
use crate::signing::SigningService;
use axum::http::StatusCode;
use redis::Client;
use std::sync::Arc;

/// Shared application state passed to all Axum handlers.
///
/// Serves as the dependency injection container for the application:
/// handlers depend on abstractions (the repository traits and the signing
/// service), not concrete implementations; the state is built once at
/// startup and never mutated; heavy resources are wrapped in `Arc` so
/// cloning per request is cheap.
#[derive(Clone)]
pub(crate) struct AppState {
    /// Redis client for creating multiplexed async connections on demand.
    /// Used by the full-mode health check.
    redis_client: Client,

    /// Metrics implementation (Prometheus or no-op).
    metrics: MetricsPtr,

    /// Invoice persistence, used by the invoice CRUD handlers.
    documents: DocumentRepositoryPtr,

    /// The signing subsystem facade.
    signing: Arc<SigningService>,
}

impl AppState {
    // ---

    pub fn new(
        redis_client: Client,
        metrics: MetricsPtr,
        documents: DocumentRepositoryPtr,
        signing: Arc<SigningService>,
    ) -> Self {
        // ---
        AppState {
            redis_client,
            metrics,
            documents,
            signing,
        }
    }

    /// Creates a new multiplexed Redis connection.
    ///
    /// Logs an error if connection fails and returns HTTP 500.
    pub(crate) async fn get_conn(&self) -> Result<redis::aio::MultiplexedConnection, StatusCode> {
        // ---
        self.redis_client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| {
                tracing::error!("Failed to connect to Redis: {:?}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            })
    }

    /// Get a reference to the metrics implementation.
    pub(crate) fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    /// Get a reference to the document repository.
    pub(crate) fn documents(&self) -> &DocumentRepositoryPtr {
        // ---
        &self.documents
    }

    /// Get a reference to the signing service.
    pub(crate) fn signing(&self) -> &SigningService {
        // ---
        &self.signing
    }
}
