//! In-memory infrastructure implementations.
//!
//! Single-process reference implementations of the persistence traits,
//! used by tests and local development. The conditional update holds the
//! map lock across the status check and the mutation, which gives the same
//! at-most-one-winner semantics the Postgres conditional UPDATE provides.

use crate::domain::{
    AuditEvent, AuditSink, AuditSinkPtr, Credential, CredentialRepository,
    CredentialRepositoryPtr, DocumentRepository, DocumentRepositoryPtr, Invoice, InvoicePatch,
    InvoiceStatus, User,
};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Creates an in-memory document repository.
pub fn create_memory_document_repository() -> DocumentRepositoryPtr {
    // ---
    Arc::new(MemoryDocumentRepository::default())
}

/// Creates an in-memory credential repository.
pub fn create_memory_credential_repository() -> CredentialRepositoryPtr {
    // ---
    Arc::new(MemoryCredentialRepository::default())
}

/// Creates an in-memory audit sink that retains recorded events.
pub fn create_memory_audit_sink() -> Arc<MemoryAuditSink> {
    // ---
    Arc::new(MemoryAuditSink::default())
}

#[derive(Default)]
pub struct MemoryDocumentRepository {
    // ---
    invoices: Mutex<HashMap<Uuid, Invoice>>,
}

#[async_trait::async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    // ---
    async fn create(&self, invoice: Invoice) -> Result<()> {
        // ---
        let mut invoices = self.invoices.lock().expect("document store poisoned");
        if invoices.contains_key(&invoice.id) {
            anyhow::bail!("invoice {} already exists", invoice.id);
        }
        invoices.insert(invoice.id, invoice);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>> {
        // ---
        let invoices = self.invoices.lock().expect("document store poisoned");
        Ok(invoices.get(&id).cloned())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected: InvoiceStatus,
        patch: InvoicePatch,
    ) -> Result<bool> {
        // ---
        // Check and mutate under one lock: the in-memory equivalent of a
        // single conditional UPDATE statement.
        let mut invoices = self.invoices.lock().expect("document store poisoned");
        let Some(invoice) = invoices.get_mut(&id) else {
            return Ok(false);
        };
        if invoice.status != expected {
            return Ok(false);
        }

        invoice.status = patch.status;
        if let Some(totals) = patch.totals {
            invoice.totals = totals;
        }
        if let Some(signature) = patch.signature {
            invoice.signature = Some(signature);
        }
        if let Some(artifact_ref) = patch.artifact_ref {
            invoice.artifact_ref = Some(artifact_ref);
        }

        Ok(true)
    }
}

#[derive(Default)]
pub struct MemoryCredentialRepository {
    // ---
    users: Mutex<HashMap<Uuid, User>>,
    credentials: Mutex<HashMap<Uuid, Credential>>,
}

#[async_trait::async_trait]
impl CredentialRepository for MemoryCredentialRepository {
    // ---
    async fn create_user(&self, username: &str) -> Result<User> {
        // ---
        let user = User::new(username.to_string());
        let mut users = self.users.lock().expect("user store poisoned");
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        // ---
        let users = self.users.lock().expect("user store poisoned");
        Ok(users.get(&user_id).cloned())
    }

    async fn save_credential(&self, credential: Credential) -> Result<()> {
        // ---
        let mut credentials = self.credentials.lock().expect("credential store poisoned");
        credentials.insert(credential.user_id, credential);
        Ok(())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Credential>> {
        // ---
        let credentials = self.credentials.lock().expect("credential store poisoned");
        Ok(credentials.get(&user_id).cloned())
    }

    async fn update_counter(&self, credential_id: &[u8], new_counter: i64) -> Result<()> {
        // ---
        let mut credentials = self.credentials.lock().expect("credential store poisoned");
        for credential in credentials.values_mut() {
            if credential.id == credential_id {
                // Monotone write: a stale value never regresses the counter,
                // mirroring the conditional UPDATE in the Postgres backend.
                if new_counter > credential.counter {
                    credential.counter = new_counter;
                }
                return Ok(());
            }
        }
        anyhow::bail!("credential {} not found", hex::encode(credential_id))
    }
}

/// Audit sink that retains events in memory so tests can assert on them.
#[derive(Default)]
pub struct MemoryAuditSink {
    // ---
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    // ---
    pub fn events(&self) -> Vec<AuditEvent> {
        // ---
        self.events.lock().expect("audit sink poisoned").clone()
    }
}

#[async_trait::async_trait]
impl AuditSink for MemoryAuditSink {
    // ---
    async fn record(&self, event: AuditEvent) {
        // ---
        self.events.lock().expect("audit sink poisoned").push(event);
    }
}

/// Convenience alias used when wiring tests.
pub fn memory_audit_ptr(sink: Arc<MemoryAuditSink>) -> AuditSinkPtr {
    // ---
    sink
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::{LineItem, TaxMode};
    use crate::signing::tax;

    fn draft_invoice() -> Invoice {
        // ---
        let line_items = vec![LineItem {
            description: "widget".to_string(),
            quantity: 1,
            unit_rate_minor: 500,
        }];
        let tax_mode = TaxMode::SingleRate { rate_bp: 1000 };
        let totals = tax::compute(&line_items, tax_mode, 0).unwrap();
        Invoice {
            id: Uuid::new_v4(),
            status: InvoiceStatus::Draft,
            line_items,
            tax_mode,
            discount_minor: 0,
            totals,
            signature: None,
            artifact_ref: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn conditional_update_swaps_only_on_expected_status() {
        // ---
        let repo = MemoryDocumentRepository::default();
        let invoice = draft_invoice();
        let id = invoice.id;
        repo.create(invoice).await.unwrap();

        let swapped = repo
            .conditional_update(id, InvoiceStatus::Draft, InvoicePatch::cancelled())
            .await
            .unwrap();
        assert!(swapped);

        // Terminal now; no further transition applies.
        let swapped = repo
            .conditional_update(id, InvoiceStatus::Draft, InvoicePatch::cancelled())
            .await
            .unwrap();
        assert!(!swapped);

        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Cancelled);
    }

    #[tokio::test]
    async fn conditional_update_on_missing_document_is_false() {
        // ---
        let repo = MemoryDocumentRepository::default();
        let swapped = repo
            .conditional_update(Uuid::new_v4(), InvoiceStatus::Draft, InvoicePatch::cancelled())
            .await
            .unwrap();
        assert!(!swapped);
    }

    #[tokio::test]
    async fn counter_updates_land_on_the_right_credential() {
        // ---
        let repo = MemoryCredentialRepository::default();
        let user = repo.create_user("ada").await.unwrap();
        let credential = Credential::new(vec![1, 2], user.id, vec![0u8; 32], 0);
        repo.save_credential(credential.clone()).await.unwrap();

        repo.update_counter(&credential.id, 7).await.unwrap();

        let stored = repo.find_by_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.counter, 7);
    }

    #[tokio::test]
    async fn stale_counter_write_cannot_regress() {
        // ---
        let repo = MemoryCredentialRepository::default();
        let user = repo.create_user("ada").await.unwrap();
        let credential = Credential::new(vec![1, 2], user.id, vec![0u8; 32], 0);
        repo.save_credential(credential.clone()).await.unwrap();

        repo.update_counter(&credential.id, 7).await.unwrap();
        // A racing writer that verified an older assertion loses.
        repo.update_counter(&credential.id, 3).await.unwrap();

        let stored = repo.find_by_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.counter, 7);
    }
}
