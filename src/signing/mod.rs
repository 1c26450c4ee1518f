//! The signing subsystem.
//!
//! Flow: the caller requests a challenge, the client answers it off-system
//! with a signed assertion, the verifier checks the assertion against the
//! stored public key, the replay guard validates and persists the counter,
//! the state machine performs the atomic Draft -> Signed transition, and
//! the renderer emits the permanent artifact.

pub mod artifact;
pub mod assertion;
pub mod challenge;
mod error;
pub mod replay;
mod state_machine;
pub mod tax;

pub use artifact::{artifact_ref, ArtifactRenderer};
pub use assertion::{Assertion, AssertionVerifier, Verification};
pub use challenge::{Challenge, ChallengeStore, ChallengeStorePtr, MemoryChallengeStore, Purpose};
pub use error::SignError;
pub use replay::ReplayGuard;
pub use state_machine::SigningStateMachine;

use crate::domain::{
    AuditEvent, AuditSinkPtr, CredentialRepositoryPtr, DocumentRepositoryPtr, InvoicePatch,
    InvoiceStatus,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Response to a challenge request.
#[derive(Debug, Serialize)]
pub struct ChallengeGrant {
    // ---
    /// base64url (unpadded) challenge bytes for the client to sign over.
    pub challenge: String,
    pub expires_in_secs: u64,
    /// base64url credential ID the client should answer with.
    pub credential_id: String,
}

/// Result of a committed sign.
#[derive(Debug, Serialize)]
pub struct SignOutcome {
    // ---
    pub document_id: Uuid,
    pub status: InvoiceStatus,
    pub signed_at: DateTime<Utc>,
    pub artifact_ref: Option<String>,
}

/// Facade over the signing components, exposing the three operations the
/// surrounding application layer consumes: issue-challenge, verify-and-sign,
/// and render-artifact.
pub struct SigningService {
    // ---
    challenges: ChallengeStorePtr,
    verifier: AssertionVerifier,
    replay_guard: ReplayGuard,
    state_machine: SigningStateMachine,
    renderer: Arc<ArtifactRenderer>,
    credentials: CredentialRepositoryPtr,
    documents: DocumentRepositoryPtr,
    audit: AuditSinkPtr,
    challenge_ttl_secs: u64,
}

impl SigningService {
    // ---
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        challenges: ChallengeStorePtr,
        verifier: AssertionVerifier,
        documents: DocumentRepositoryPtr,
        credentials: CredentialRepositoryPtr,
        audit: AuditSinkPtr,
        renderer: Arc<ArtifactRenderer>,
        challenge_ttl_secs: u64,
    ) -> Self {
        // ---
        Self {
            replay_guard: ReplayGuard::new(credentials.clone()),
            state_machine: SigningStateMachine::new(
                documents.clone(),
                renderer.clone(),
                audit.clone(),
            ),
            challenges,
            verifier,
            renderer,
            credentials,
            documents,
            audit,
            challenge_ttl_secs,
        }
    }

    /// Issue a fresh single-use challenge for a user and purpose.
    ///
    /// Fails with `CredentialNotConfigured` when the user has no registered
    /// credential; issuing a new challenge invalidates any outstanding one
    /// for the same (user, purpose).
    pub async fn issue_challenge(
        &self,
        user_id: Uuid,
        purpose: Purpose,
    ) -> Result<ChallengeGrant, SignError> {
        // ---
        let credential = self
            .credentials
            .find_by_user(user_id)
            .await?
            .ok_or(SignError::CredentialNotConfigured)?;

        let challenge = self
            .challenges
            .issue(user_id, purpose, self.challenge_ttl_secs)
            .await?;

        tracing::info!(
            "Issued {} challenge for user {}",
            purpose.as_str(),
            user_id
        );

        Ok(ChallengeGrant {
            challenge: URL_SAFE_NO_PAD.encode(&challenge.bytes),
            expires_in_secs: self.challenge_ttl_secs,
            credential_id: URL_SAFE_NO_PAD.encode(&credential.id),
        })
    }

    /// Verify a signed assertion and, on success, sign the invoice.
    ///
    /// Gates in order: credential lookup, atomic challenge consume (burned
    /// on this attempt no matter the outcome), assertion verification,
    /// counter advance, then the atomic state transition. Every failure is
    /// audited with its stable code; none are retried here.
    pub async fn verify_and_sign(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        assertion: Assertion,
    ) -> Result<SignOutcome, SignError> {
        // ---
        let outcome = self.try_verify_and_sign(user_id, document_id, assertion).await;

        if let Err(err) = &outcome {
            self.audit
                .record(AuditEvent::new(
                    "sign_failed",
                    document_id,
                    Some(user_id),
                    format!("signing attempt failed: {}", err.code()),
                ))
                .await;
        }

        outcome
    }

    async fn try_verify_and_sign(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        assertion: Assertion,
    ) -> Result<SignOutcome, SignError> {
        // ---
        let signer = self
            .credentials
            .find_user(user_id)
            .await?
            .ok_or(SignError::CredentialNotConfigured)?;
        let credential = self
            .credentials
            .find_by_user(user_id)
            .await?
            .ok_or(SignError::CredentialNotConfigured)?;

        // One verification attempt per challenge, success or not.
        let presented = assertion.presented_challenge()?;
        let challenge = self
            .challenges
            .consume(user_id, Purpose::Sign, &presented)
            .await?;

        let verification = self
            .verifier
            .verify(&assertion, &credential, &challenge.bytes)?;

        // Persist the counter before the state transition (see ReplayGuard).
        self.replay_guard
            .advance(&credential, verification.new_counter)
            .await?;

        let signed = self
            .state_machine
            .sign(document_id, &signer, challenge.bytes)
            .await?;

        let signature = signed.signature.as_ref().ok_or(SignError::InvalidState)?;
        let signed_at = signature.verified_at.ok_or(SignError::InvalidState)?;

        tracing::info!(
            "Invoice {} signed by user {} ({})",
            document_id,
            user_id,
            signer.username
        );

        Ok(SignOutcome {
            document_id,
            status: signed.status,
            signed_at,
            artifact_ref: signed.artifact_ref.clone(),
        })
    }

    /// Idempotently (re-)render the artifact of an already-signed invoice.
    ///
    /// Usable for re-download without re-signing, and for completing a sign
    /// that committed with a pending artifact. Backfills the stored artifact
    /// pointer when it is missing.
    pub async fn render_artifact(&self, document_id: Uuid) -> Result<Vec<u8>, SignError> {
        // ---
        let invoice = self
            .documents
            .find_by_id(document_id)
            .await?
            .ok_or(SignError::DocumentNotFound)?;

        if invoice.status != InvoiceStatus::Signed {
            return Err(SignError::InvalidState);
        }
        let signature = invoice.signature.as_ref().ok_or(SignError::InvalidState)?;
        let signed_at = signature.verified_at.ok_or(SignError::InvalidState)?;

        let bytes = self
            .renderer
            .render(&invoice, &signature.signer_name, signed_at)?;

        if invoice.artifact_ref.is_none() {
            let patch = InvoicePatch {
                status: InvoiceStatus::Signed,
                totals: None,
                signature: None,
                artifact_ref: Some(artifact_ref(&bytes)),
            };
            // Best effort: the artifact is re-derivable either way.
            if let Err(err) = self
                .documents
                .conditional_update(document_id, InvoiceStatus::Signed, patch)
                .await
            {
                tracing::warn!(
                    "Failed to backfill artifact ref for invoice {}: {}",
                    document_id,
                    err
                );
            }
        }

        Ok(bytes)
    }
}
