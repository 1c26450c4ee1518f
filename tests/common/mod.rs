//! Shared harness for signing-flow integration tests.
//!
//! Builds the full signing service on top of the in-memory infrastructure
//! and plays the client side of the ceremony with a real Ed25519 key, so
//! the tests exercise the exact byte layouts production clients produce.

#![allow(dead_code)]

use ed25519_dalek::{Signer, SigningKey};
use invoice_signer::domain::{
    Credential, CredentialRepositoryPtr, DocumentRepositoryPtr, Invoice, InvoiceStatus, LineItem,
    SignatureRecord, TaxMode, User,
};
use invoice_signer::memory::{
    create_memory_audit_sink, create_memory_credential_repository,
    create_memory_document_repository, memory_audit_ptr, MemoryAuditSink,
};
use invoice_signer::signing::{
    assertion::{build_authenticator_data, signed_payload, ClientData, CLIENT_DATA_TYPE},
    tax, ArtifactRenderer, Assertion, AssertionVerifier, MemoryChallengeStore, SigningService,
};
use std::sync::Arc;
use uuid::Uuid;

pub const RP_ID: &str = "invoices.example.com";
pub const ORIGIN: &str = "https://invoices.example.com";

const FLAG_USER_PRESENT: u8 = 0x01;

pub struct Harness {
    // ---
    pub signing: SigningService,
    pub documents: DocumentRepositoryPtr,
    pub credentials: CredentialRepositoryPtr,
    pub audit: Arc<MemoryAuditSink>,
}

impl Harness {
    // ---
    pub fn new() -> Self {
        // ---
        Self::with_challenge_ttl(60)
    }

    pub fn with_challenge_ttl(ttl_secs: u64) -> Self {
        // ---
        let documents = create_memory_document_repository();
        let credentials = create_memory_credential_repository();
        let audit = create_memory_audit_sink();

        let signing = SigningService::new(
            Arc::new(MemoryChallengeStore::new()),
            AssertionVerifier::new(RP_ID, ORIGIN),
            documents.clone(),
            credentials.clone(),
            memory_audit_ptr(audit.clone()),
            Arc::new(ArtifactRenderer::new()),
            ttl_secs,
        );

        Self {
            signing,
            documents,
            credentials,
            audit,
        }
    }

    /// Create a user with a registered Ed25519 credential, the way the
    /// registration ceremony would leave the store.
    pub async fn register_signer(&self, username: &str, key_seed: u8) -> (User, SigningKey) {
        // ---
        let key = SigningKey::from_bytes(&[key_seed; 32]);
        let user = self
            .credentials
            .create_user(username)
            .await
            .expect("Failed to create test user");

        let credential = Credential::new(
            vec![key_seed, 0xC4, 0x1D],
            user.id,
            key.verifying_key().to_bytes().to_vec(),
            0,
        );
        self.credentials
            .save_credential(credential)
            .await
            .expect("Failed to save test credential");

        (user, key)
    }

    /// Create and store a draft invoice with server-computed totals.
    pub async fn create_draft(&self) -> Invoice {
        // ---
        let line_items = vec![
            LineItem {
                description: "consulting".to_string(),
                quantity: 2,
                unit_rate_minor: 10_000,
            },
            LineItem {
                description: "travel".to_string(),
                quantity: 1,
                unit_rate_minor: 4_500,
            },
        ];
        let tax_mode = TaxMode::SplitRate { component_bp: 900 };
        let totals = tax::compute(&line_items, tax_mode, 500).expect("Failed to compute totals");

        let invoice = Invoice {
            id: Uuid::new_v4(),
            status: InvoiceStatus::Draft,
            line_items,
            tax_mode,
            discount_minor: 500,
            totals,
            signature: None,
            artifact_ref: None,
            created_at: chrono::Utc::now(),
        };

        self.documents
            .create(invoice.clone())
            .await
            .expect("Failed to store draft invoice");

        invoice
    }

    /// Store an invoice already in the Signed state with a pending artifact
    /// pointer, as a sign whose artifact render degraded would leave it.
    pub async fn create_signed_pending_artifact(&self, signer: &User) -> Invoice {
        // ---
        let line_items = vec![LineItem {
            description: "consulting".to_string(),
            quantity: 1,
            unit_rate_minor: 25_000,
        }];
        let tax_mode = TaxMode::SingleRate { rate_bp: 1800 };
        let totals = tax::compute(&line_items, tax_mode, 0).expect("Failed to compute totals");
        let id = Uuid::new_v4();
        let signed_at = chrono::Utc::now();

        let invoice = Invoice {
            id,
            status: InvoiceStatus::Signed,
            line_items,
            tax_mode,
            discount_minor: 0,
            totals,
            signature: Some(SignatureRecord {
                document_id: id,
                signer_user_id: signer.id,
                signer_name: signer.username.clone(),
                challenge: vec![0x42; 32],
                verified: true,
                verified_at: Some(signed_at),
                attestation: format!("Signed by {} via registered credential", signer.username),
            }),
            artifact_ref: None,
            created_at: signed_at,
        };

        self.documents
            .create(invoice.clone())
            .await
            .expect("Failed to store signed invoice");

        invoice
    }

    /// Fetch the stored copy of an invoice.
    pub async fn stored(&self, id: Uuid) -> Invoice {
        // ---
        self.documents
            .find_by_id(id)
            .await
            .expect("Failed to read invoice")
            .expect("Invoice missing")
    }

    /// Registered credential ID for a user.
    pub async fn credential_id(&self, user_id: Uuid) -> Vec<u8> {
        // ---
        self.credentials
            .find_by_user(user_id)
            .await
            .expect("Failed to read credential")
            .expect("Credential missing")
            .id
    }

    /// Full client-side round: request a challenge, answer it with the
    /// given counter, and submit the assertion for the document.
    pub async fn sign_attempt(
        &self,
        user: &User,
        key: &SigningKey,
        document_id: Uuid,
        counter: u32,
    ) -> Result<invoice_signer::signing::SignOutcome, invoice_signer::signing::SignError> {
        // ---
        let grant = self
            .signing
            .issue_challenge(user.id, invoice_signer::signing::Purpose::Sign)
            .await?;
        let credential_id = self.credential_id(user.id).await;
        let assertion = answer_challenge(key, &credential_id, &grant.challenge, counter);
        self.signing
            .verify_and_sign(user.id, document_id, assertion)
            .await
    }

    /// Current persisted counter for a user's credential.
    pub async fn counter(&self, user_id: Uuid) -> i64 {
        // ---
        self.credentials
            .find_by_user(user_id)
            .await
            .expect("Failed to read credential")
            .expect("Credential missing")
            .counter
    }
}

/// Play the client: sign the challenge from a grant the way an
/// authenticator would, producing a wire-ready assertion.
pub fn answer_challenge(
    key: &SigningKey,
    credential_id: &[u8],
    challenge_b64: &str,
    counter: u32,
) -> Assertion {
    // ---
    let client_data = serde_json::to_vec(&ClientData {
        type_: CLIENT_DATA_TYPE.to_string(),
        challenge: challenge_b64.to_string(),
        origin: ORIGIN.to_string(),
    })
    .expect("Failed to serialize client data");

    let authenticator_data = build_authenticator_data(RP_ID, FLAG_USER_PRESENT, counter);
    let signature = key.sign(&signed_payload(&authenticator_data, &client_data));

    Assertion {
        credential_id: credential_id.to_vec(),
        client_data_json: client_data,
        authenticator_data,
        signature: signature.to_bytes().to_vec(),
    }
}
