//! Invoice document handlers.
//!
//! Drafts are created with server-computed totals (client-submitted totals
//! are never stored), can be fetched, and can be cancelled while still in
//! Draft. The artifact endpoint re-renders the permanent artifact of a
//! signed invoice; re-rendering is idempotent and byte-identical.

use crate::domain::{Invoice, InvoiceStatus, LineItem, TaxMode};
use crate::handlers::shared_types::{ApiError, ApiResponse};
use crate::signing::{tax, SignError};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// Request body for creating a draft invoice. Validated exhaustively before
/// any side effect; totals are derived here, never accepted from the client.
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    //
    pub line_items: Vec<LineItem>,
    pub tax_mode: TaxMode,
    #[serde(default)]
    pub discount_minor: i64,
}

/// Handler for creating a new draft invoice (POST /invoices).
///
/// - Computes subtotal, tax breakdown, and grand total server-side.
/// - Responds with `201 Created` and the stored invoice on success.
/// - Responds with `400 Bad Request` for invalid line items or discount.
#[tracing::instrument(skip(state, req))]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, ApiResponse<Invoice>), ApiError> {
    // ---
    let totals = tax::compute(&req.line_items, req.tax_mode, req.discount_minor)?;

    let invoice = Invoice {
        id: Uuid::new_v4(),
        status: InvoiceStatus::Draft,
        line_items: req.line_items,
        tax_mode: req.tax_mode,
        discount_minor: req.discount_minor,
        totals,
        signature: None,
        artifact_ref: None,
        created_at: Utc::now(),
    };

    state
        .documents()
        .create(invoice.clone())
        .await
        .map_err(SignError::Storage)?;

    tracing::info!("Created draft invoice {}", invoice.id);

    Ok((StatusCode::CREATED, ApiResponse { data: invoice }))
}

/// Handler for fetching an invoice by ID (GET /invoices/{id}).
#[tracing::instrument(skip(state))]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Invoice>, ApiError> {
    // ---
    let invoice = state
        .documents()
        .find_by_id(id)
        .await
        .map_err(SignError::Storage)?
        .ok_or(SignError::DocumentNotFound)?;

    Ok(ApiResponse { data: invoice })
}

/// Handler for cancelling a draft invoice (POST /invoices/{id}/cancel).
///
/// Cancellation is a terminal transition and uses the same conditional
/// update as signing, so it can never race a concurrent sign into an
/// inconsistent state: one of the two wins, the other gets a conflict.
#[tracing::instrument(skip(state))]
pub async fn cancel_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Invoice>, ApiError> {
    // ---
    let swapped = state
        .documents()
        .conditional_update(
            id,
            InvoiceStatus::Draft,
            crate::domain::InvoicePatch::cancelled(),
        )
        .await
        .map_err(SignError::Storage)?;

    let invoice = state
        .documents()
        .find_by_id(id)
        .await
        .map_err(SignError::Storage)?
        .ok_or(SignError::DocumentNotFound)?;

    if !swapped {
        return Err(match invoice.status {
            InvoiceStatus::Signed => SignError::AlreadySigned.into(),
            InvoiceStatus::Cancelled => SignError::DocumentCancelled.into(),
            InvoiceStatus::Draft => SignError::InvalidState.into(),
        });
    }

    tracing::info!("Cancelled invoice {}", id);

    Ok(ApiResponse { data: invoice })
}

/// Handler for downloading the signed artifact (GET /invoices/{id}/artifact).
///
/// Idempotent re-render: the artifact is a pure function of the frozen
/// invoice, so re-downloading never requires re-signing and always yields
/// the same bytes.
#[tracing::instrument(skip(state))]
pub async fn get_artifact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let bytes = state.signing().render_artifact(id).await?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        bytes,
    ))
}
