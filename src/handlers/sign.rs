//! Signing flow handlers.
//!
//! Two-phase flow mirroring the WebAuthn "get" ceremony:
//! 1. `challenge_start` - issue a single-use challenge bound to the user
//! 2. `sign_finish` - verify the client's signed assertion and atomically
//!    transition the invoice to Signed
//!
//! All request bodies are tagged, exhaustively-validated variants decoded
//! before any side effect occurs.

use crate::handlers::shared_types::{ApiError, ApiResponse};
use crate::signing::{Assertion, ChallengeGrant, Purpose, SignError, SignOutcome};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    //
    pub user_id: Uuid,
    pub purpose: Purpose,
}

/// Wire form of an assertion: base64url (unpadded) fields as produced by
/// the client credential API.
#[derive(Debug, Deserialize)]
pub struct AssertionBody {
    //
    pub credential_id: String,
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    //
    pub user_id: Uuid,
    pub assertion: AssertionBody,
}

impl AssertionBody {
    fn decode(self) -> Result<Assertion, SignError> {
        // ---
        let decode = |label: &str, value: &str| {
            URL_SAFE_NO_PAD
                .decode(value.as_bytes())
                .map_err(|_| SignError::InvalidRequest(format!("malformed {label} encoding")))
        };

        Ok(Assertion {
            credential_id: decode("credential_id", &self.credential_id)?,
            client_data_json: decode("client_data_json", &self.client_data_json)?,
            authenticator_data: decode("authenticator_data", &self.authenticator_data)?,
            signature: decode("signature", &self.signature)?,
        })
    }
}

/// Initiates signing by issuing a single-use challenge (POST /signing/challenge).
///
/// # Flow
/// 1. Verify the user has a registered credential
/// 2. Generate a fresh random challenge with the configured TTL
/// 3. Store it keyed by (user, purpose) - last-issued-wins
/// 4. Return the challenge and credential ID to the client
///
/// # Security
/// - The challenge expires after the configured TTL (60 seconds default)
/// - Issuing a new challenge invalidates any outstanding one
#[tracing::instrument(skip(state, req))]
pub async fn challenge_start(
    State(state): State<AppState>,
    Json(req): Json<ChallengeRequest>,
) -> Result<(StatusCode, ApiResponse<ChallengeGrant>), ApiError> {
    // ---
    let grant = state
        .signing()
        .issue_challenge(req.user_id, req.purpose)
        .await?;

    state.metrics().record_challenge_issued();

    Ok((StatusCode::CREATED, ApiResponse { data: grant }))
}

/// Completes signing by verifying the assertion (POST /invoices/{id}/sign).
///
/// # Flow
/// 1. Decode and validate the assertion body
/// 2. Consume the outstanding challenge (burned on this attempt either way)
/// 3. Verify the signature, origin, and relying-party identity
/// 4. Validate and persist the signature counter (replay defense)
/// 5. Atomically transition the invoice Draft -> Signed
///
/// # Security
/// - Every failure consumes the challenge; the client must re-issue
/// - Concurrent sign attempts on one invoice: exactly one success
#[tracing::instrument(skip(state, req))]
pub async fn sign_finish(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(req): Json<SignRequest>,
) -> Result<ApiResponse<SignOutcome>, ApiError> {
    // ---
    let assertion = req.assertion.decode()?;

    let outcome = state
        .signing()
        .verify_and_sign(req.user_id, document_id, assertion)
        .await;

    match &outcome {
        Ok(_) => state.metrics().record_invoice_signed(),
        Err(err) => state.metrics().record_sign_failure(err.code()),
    }

    let outcome = outcome?;
    Ok(ApiResponse { data: outcome })
}
