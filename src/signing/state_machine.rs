//! The Draft -> Signed state transition.
//!
//! States: Draft (initial), Signed (terminal), Cancelled (terminal).
//! Draft -> Signed happens only here, after replay-guard success; Draft ->
//! Cancelled is an external trigger this machine respects as a guard.
//! Concurrent sign calls on one document are resolved by the repository's
//! compare-and-swap, not by application-level locking, so the guarantee
//! holds across processes.

use crate::domain::{
    AuditEvent, AuditSinkPtr, DocumentRepositoryPtr, Invoice, InvoicePatch, InvoiceStatus,
    SignatureRecord, User,
};
use crate::signing::artifact::{artifact_ref, ArtifactRenderer};
use crate::signing::{tax, SignError};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct SigningStateMachine {
    // ---
    documents: DocumentRepositoryPtr,
    renderer: Arc<ArtifactRenderer>,
    audit: AuditSinkPtr,
}

impl SigningStateMachine {
    // ---
    pub fn new(
        documents: DocumentRepositoryPtr,
        renderer: Arc<ArtifactRenderer>,
        audit: AuditSinkPtr,
    ) -> Self {
        // ---
        Self {
            documents,
            renderer,
            audit,
        }
    }

    /// Atomically transition an invoice Draft -> Signed.
    ///
    /// Totals are re-derived from line items one final time and compared
    /// exactly against the stored totals; any disagreement refuses the sign
    /// with `TotalsMismatch` (stale or tampered client state). The status
    /// flip, the verified signature record, the frozen totals, and the
    /// artifact pointer travel in a single conditional update, so either
    /// the document becomes Signed with its signature record or nothing
    /// changes at all.
    ///
    /// Artifact rendering failure does not void the sign: the invoice
    /// commits with a pending artifact pointer, the failure is audited as a
    /// distinct degraded class, and the artifact endpoint can re-render.
    pub async fn sign(
        &self,
        document_id: Uuid,
        signer: &User,
        challenge: Vec<u8>,
    ) -> Result<Invoice, SignError> {
        // ---
        let invoice = self
            .documents
            .find_by_id(document_id)
            .await?
            .ok_or(SignError::DocumentNotFound)?;

        match invoice.status {
            InvoiceStatus::Draft => {}
            InvoiceStatus::Signed => return Err(SignError::AlreadySigned),
            InvoiceStatus::Cancelled => return Err(SignError::DocumentCancelled),
        }

        // Defensive recomputation: never trust totals past creation.
        let recomputed = tax::compute(&invoice.line_items, invoice.tax_mode, invoice.discount_minor)?;
        if recomputed != invoice.totals {
            tracing::error!(
                "Totals mismatch on invoice {}: stored grand total {}, recomputed {}",
                document_id,
                invoice.totals.grand_total_minor,
                recomputed.grand_total_minor
            );
            return Err(SignError::TotalsMismatch);
        }

        let signed_at = Utc::now();
        let signature = SignatureRecord {
            document_id,
            signer_user_id: signer.id,
            signer_name: signer.username.clone(),
            challenge,
            verified: true,
            verified_at: Some(signed_at),
            attestation: format!(
                "Signed by {} on {} via registered credential",
                signer.username,
                signed_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        };

        let mut signed = invoice.clone();
        signed.status = InvoiceStatus::Signed;
        signed.totals = recomputed.clone();
        signed.signature = Some(signature.clone());

        // Rendering is pure, so doing it before the swap costs nothing if
        // the swap loses the race; failure here downgrades to a pending
        // artifact instead of aborting the sign.
        let rendered_ref = match self.renderer.render(&signed, &signer.username, signed_at) {
            Ok(bytes) => Some(artifact_ref(&bytes)),
            Err(err) => {
                tracing::error!(
                    "Artifact rendering failed for invoice {} (sign still commits): {}",
                    document_id,
                    err
                );
                self.audit
                    .record(AuditEvent::new(
                        "artifact_render_degraded",
                        document_id,
                        Some(signer.id),
                        format!("artifact rendering failed, pending re-render: {err}"),
                    ))
                    .await;
                None
            }
        };
        signed.artifact_ref = rendered_ref.clone();

        let patch = InvoicePatch {
            status: InvoiceStatus::Signed,
            totals: Some(recomputed),
            signature: Some(signature),
            artifact_ref: rendered_ref,
        };

        let swapped = self
            .documents
            .conditional_update(document_id, InvoiceStatus::Draft, patch)
            .await?;

        if !swapped {
            // Lost a race; report what the document became.
            let current = self
                .documents
                .find_by_id(document_id)
                .await?
                .ok_or(SignError::DocumentNotFound)?;
            return Err(match current.status {
                InvoiceStatus::Signed => SignError::AlreadySigned,
                InvoiceStatus::Cancelled => SignError::DocumentCancelled,
                InvoiceStatus::Draft => SignError::InvalidState,
            });
        }

        self.audit
            .record(AuditEvent::new(
                "invoice_signed",
                document_id,
                Some(signer.id),
                format!("invoice signed by {}", signer.username),
            ))
            .await;

        Ok(signed)
    }
}
