//! Integration tests for the invoice signing flow.
//!
//! Covers the complete ceremony end to end: challenge issuance, assertion
//! verification, replay defense, the atomic Draft -> Signed transition, and
//! artifact rendering, all against the in-memory infrastructure.

use invoice_signer::domain::{InvoicePatch, InvoiceStatus};
use invoice_signer::signing::{artifact_ref, Purpose};

mod common;
use common::{answer_challenge, Harness};

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn full_flow_signs_draft_and_renders_artifact() {
    // ---
    let harness = Harness::new();
    let (user, key) = harness.register_signer("ada", 11).await;
    let draft = harness.create_draft().await;

    let outcome = harness
        .sign_attempt(&user, &key, draft.id, 1)
        .await
        .expect("Signing should succeed");

    assert_eq!(outcome.document_id, draft.id);
    assert_eq!(outcome.status, InvoiceStatus::Signed);

    // Status flip and signature record landed together.
    let stored = harness.stored(draft.id).await;
    assert_eq!(stored.status, InvoiceStatus::Signed);
    let record = stored.signature.as_ref().expect("Signature record missing");
    assert!(record.verified);
    assert_eq!(record.signer_user_id, user.id);
    assert_eq!(record.signer_name, "ada");
    assert_eq!(record.verified_at, Some(outcome.signed_at));

    // Counter persisted from the assertion.
    assert_eq!(harness.counter(user.id).await, 1);

    // Artifact pointer is the content address of the rendered bytes, and
    // re-rendering is byte-identical.
    let first = harness.signing.render_artifact(draft.id).await.unwrap();
    let second = harness.signing.render_artifact(draft.id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(stored.artifact_ref, Some(artifact_ref(&first)));

    let kinds: Vec<String> = harness.audit.events().iter().map(|e| e.kind.clone()).collect();
    assert!(kinds.contains(&"invoice_signed".to_string()));
}

// ============================================================================
// Challenge lifecycle
// ============================================================================

#[tokio::test]
async fn challenge_is_burned_by_first_attempt() {
    // ---
    let harness = Harness::new();
    let (user, key) = harness.register_signer("ada", 11).await;
    let draft = harness.create_draft().await;

    let grant = harness
        .signing
        .issue_challenge(user.id, Purpose::Sign)
        .await
        .unwrap();
    let credential_id = harness.credential_id(user.id).await;
    let assertion = answer_challenge(&key, &credential_id, &grant.challenge, 1);

    harness
        .signing
        .verify_and_sign(user.id, draft.id, assertion.clone())
        .await
        .expect("First attempt should succeed");

    // Same assertion against a fresh draft: the challenge is gone.
    let second_draft = harness.create_draft().await;
    let err = harness
        .signing
        .verify_and_sign(user.id, second_draft.id, assertion)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "challenge_expired_or_missing");
    assert_eq!(harness.counter(user.id).await, 1);
    assert_eq!(
        harness.stored(second_draft.id).await.status,
        InvoiceStatus::Draft
    );
}

#[tokio::test]
async fn failed_verification_burns_the_challenge_too() {
    // ---
    let harness = Harness::new();
    let (user, key) = harness.register_signer("ada", 11).await;
    let draft = harness.create_draft().await;

    let grant = harness
        .signing
        .issue_challenge(user.id, Purpose::Sign)
        .await
        .unwrap();
    let credential_id = harness.credential_id(user.id).await;

    // Tamper with the signature; verification fails.
    let mut tampered = answer_challenge(&key, &credential_id, &grant.challenge, 1);
    tampered.signature[0] ^= 0x01;
    let err = harness
        .signing
        .verify_and_sign(user.id, draft.id, tampered)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "signature_invalid");

    // The honest assertion no longer works: one attempt per challenge.
    let honest = answer_challenge(&key, &credential_id, &grant.challenge, 1);
    let err = harness
        .signing
        .verify_and_sign(user.id, draft.id, honest)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "challenge_expired_or_missing");

    // Nothing moved.
    assert_eq!(harness.stored(draft.id).await.status, InvoiceStatus::Draft);
    assert_eq!(harness.counter(user.id).await, 0);
}

#[tokio::test]
async fn expired_challenge_is_rejected() {
    // ---
    let harness = Harness::with_challenge_ttl(0);
    let (user, key) = harness.register_signer("ada", 11).await;
    let draft = harness.create_draft().await;

    let err = harness.sign_attempt(&user, &key, draft.id, 1).await.unwrap_err();
    assert_eq!(err.code(), "challenge_expired_or_missing");
    assert_eq!(harness.stored(draft.id).await.status, InvoiceStatus::Draft);
}

#[tokio::test]
async fn challenge_issue_requires_registered_credential() {
    // ---
    let harness = Harness::new();
    let user = harness.credentials.create_user("no-key").await.unwrap();

    let err = harness
        .signing
        .issue_challenge(user.id, Purpose::Sign)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "credential_not_configured");
}

// ============================================================================
// State machine guards
// ============================================================================

#[tokio::test]
async fn second_sign_conflicts_and_preserves_the_record() {
    // ---
    let harness = Harness::new();
    let (user, key) = harness.register_signer("ada", 11).await;
    let draft = harness.create_draft().await;

    let first = harness.sign_attempt(&user, &key, draft.id, 1).await.unwrap();

    let err = harness
        .sign_attempt(&user, &key, draft.id, 2)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "already_signed");

    // The original record is untouched.
    let stored = harness.stored(draft.id).await;
    let record = stored.signature.as_ref().unwrap();
    assert_eq!(record.verified_at, Some(first.signed_at));
}

#[tokio::test]
async fn cancelled_invoice_cannot_be_signed() {
    // ---
    let harness = Harness::new();
    let (user, key) = harness.register_signer("ada", 11).await;
    let draft = harness.create_draft().await;

    let swapped = harness
        .documents
        .conditional_update(draft.id, InvoiceStatus::Draft, InvoicePatch::cancelled())
        .await
        .unwrap();
    assert!(swapped);

    let err = harness
        .sign_attempt(&user, &key, draft.id, 1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "document_cancelled");

    let stored = harness.stored(draft.id).await;
    assert_eq!(stored.status, InvoiceStatus::Cancelled);
    assert!(stored.signature.is_none());
}

#[tokio::test]
async fn tampered_totals_refuse_the_sign() {
    // ---
    let harness = Harness::new();
    let (user, key) = harness.register_signer("ada", 11).await;
    let draft = harness.create_draft().await;

    // Corrupt the stored totals while the document is still Draft.
    let mut tampered = draft.totals.clone();
    tampered.grand_total_minor += 100;
    let swapped = harness
        .documents
        .conditional_update(
            draft.id,
            InvoiceStatus::Draft,
            InvoicePatch {
                status: InvoiceStatus::Draft,
                totals: Some(tampered),
                signature: None,
                artifact_ref: None,
            },
        )
        .await
        .unwrap();
    assert!(swapped);

    // The sign-time recomputation disagrees and refuses the transition.
    let err = harness
        .sign_attempt(&user, &key, draft.id, 1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "totals_mismatch");

    let stored = harness.stored(draft.id).await;
    assert_eq!(stored.status, InvoiceStatus::Draft);
    assert!(stored.signature.is_none());
}

#[tokio::test]
async fn signing_a_missing_document_is_not_found() {
    // ---
    let harness = Harness::new();
    let (user, key) = harness.register_signer("ada", 11).await;

    let err = harness
        .sign_attempt(&user, &key, uuid::Uuid::new_v4(), 1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "document_not_found");
}

// ============================================================================
// Replay defense
// ============================================================================

#[tokio::test]
async fn counter_regression_is_detected_as_replay() {
    // ---
    let harness = Harness::new();
    let (user, key) = harness.register_signer("ada", 11).await;

    let first = harness.create_draft().await;
    harness
        .sign_attempt(&user, &key, first.id, 5)
        .await
        .expect("First sign should succeed");
    assert_eq!(harness.counter(user.id).await, 5);

    // A fresh challenge answered with a stale counter: cloned-credential
    // signature, refused before any state transition.
    let second = harness.create_draft().await;
    let err = harness
        .sign_attempt(&user, &key, second.id, 5)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "replay_detected");

    assert_eq!(harness.stored(second.id).await.status, InvoiceStatus::Draft);
    assert_eq!(harness.counter(user.id).await, 5);

    let events = harness.audit.events();
    assert!(events
        .iter()
        .any(|e| e.kind == "sign_failed" && e.description.contains("replay_detected")));
}

// ============================================================================
// Artifact endpoint semantics
// ============================================================================

#[tokio::test]
async fn pending_artifact_is_backfilled_on_render() {
    // ---
    let harness = Harness::new();
    let (user, _key) = harness.register_signer("ada", 11).await;

    // A signed invoice whose artifact render degraded: pointer pending.
    let invoice = harness.create_signed_pending_artifact(&user).await;
    assert!(invoice.artifact_ref.is_none());

    let bytes = harness.signing.render_artifact(invoice.id).await.unwrap();

    // The content address is backfilled and re-rendering is byte-identical.
    let stored = harness.stored(invoice.id).await;
    assert_eq!(stored.status, InvoiceStatus::Signed);
    assert_eq!(stored.artifact_ref, Some(artifact_ref(&bytes)));

    let again = harness.signing.render_artifact(invoice.id).await.unwrap();
    assert_eq!(bytes, again);
}

#[tokio::test]
async fn artifact_of_unsigned_invoice_is_refused() {
    // ---
    let harness = Harness::new();
    let draft = harness.create_draft().await;

    let err = harness.signing.render_artifact(draft.id).await.unwrap_err();
    assert_eq!(err.code(), "invalid_state");
}
