//! Error taxonomy for the signing subsystem.
//!
//! Every failure a caller can act on maps to a distinct, stable error code
//! so clients can present targeted guidance ("please re-authenticate" vs.
//! "this invoice was already signed") instead of a generic 400/500.

use thiserror::Error;

/// Errors produced by the signing subsystem.
///
/// Grouped by recovery policy:
/// - client-retryable (re-issue a challenge and try again):
///   `ChallengeExpiredOrMissing`, `SignatureInvalid`, `OriginMismatch`,
///   `RpIdMismatch`, `ReplayDetected`
/// - state conflicts (refresh document state, never auto-retry):
///   `AlreadySigned`, `DocumentCancelled`, `InvalidState`
/// - integrity-fatal: `TotalsMismatch`
/// - infrastructure: `Storage`
#[derive(Debug, Error)]
pub enum SignError {
    #[error("user has no registered signing credential")]
    CredentialNotConfigured,

    #[error("invoice not found")]
    DocumentNotFound,

    #[error("invoice is already signed")]
    AlreadySigned,

    #[error("invoice has been cancelled")]
    DocumentCancelled,

    #[error("invoice is not in a signable state")]
    InvalidState,

    #[error("challenge is missing, expired, or does not match")]
    ChallengeExpiredOrMissing,

    #[error("assertion signature verification failed")]
    SignatureInvalid,

    #[error("assertion origin does not match the relying party origin")]
    OriginMismatch,

    #[error("assertion relying-party identifier does not match")]
    RpIdMismatch,

    #[error("signature counter did not advance; possible cloned credential")]
    ReplayDetected,

    #[error("stored totals disagree with recomputation from line items")]
    TotalsMismatch,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl SignError {
    /// Stable machine-readable code surfaced to API clients.
    pub fn code(&self) -> &'static str {
        // ---
        match self {
            SignError::CredentialNotConfigured => "credential_not_configured",
            SignError::DocumentNotFound => "document_not_found",
            SignError::AlreadySigned => "already_signed",
            SignError::DocumentCancelled => "document_cancelled",
            SignError::InvalidState => "invalid_state",
            SignError::ChallengeExpiredOrMissing => "challenge_expired_or_missing",
            SignError::SignatureInvalid => "signature_invalid",
            SignError::OriginMismatch => "origin_mismatch",
            SignError::RpIdMismatch => "rpid_mismatch",
            SignError::ReplayDetected => "replay_detected",
            SignError::TotalsMismatch => "totals_mismatch",
            SignError::InvalidRequest(_) => "invalid_request",
            SignError::Storage(_) => "storage_error",
        }
    }
}
