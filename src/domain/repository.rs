use super::models::{AuditEvent, Credential, Invoice, InvoicePatch, InvoiceStatus, User};
use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

/// Abstraction for invoice document persistence.
///
/// `conditional_update` is the atomicity primitive the signing state machine
/// relies on: it must apply the patch only when the stored status still
/// equals `expected`, as a single conditional write (no read-then-write),
/// and report whether the swap happened. Concurrent sign attempts on one
/// document must see at most one `true`.
#[async_trait::async_trait]
pub trait DocumentRepository: Send + Sync {
    // ---
    /// Persist a new invoice (status Draft).
    async fn create(&self, invoice: Invoice) -> Result<()>;

    /// Look up an invoice by ID.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>>;

    /// Compare-and-swap on status. Returns `true` iff the document existed
    /// with `expected` status and the patch was applied.
    async fn conditional_update(
        &self,
        id: Uuid,
        expected: InvoiceStatus,
        patch: InvoicePatch,
    ) -> Result<bool>;
}

/// Abstraction for signing credential persistence.
#[async_trait::async_trait]
pub trait CredentialRepository: Send + Sync {
    // ---
    /// Create a new user.
    async fn create_user(&self, username: &str) -> Result<User>;

    /// Get user by ID.
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Save a new credential for a user.
    async fn save_credential(&self, credential: Credential) -> Result<()>;

    /// Get the registered credential for a user, if any. Single credential
    /// per user is the baseline; re-registration replaces it.
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Credential>>;

    /// Persist a new signature counter value for a credential. Writes are
    /// monotone: a value not greater than the stored counter is a no-op,
    /// so racing writers can never regress it.
    async fn update_counter(&self, credential_id: &[u8], new_counter: i64) -> Result<()>;
}

/// Fire-and-forget audit event sink. Implementations log failures and never
/// propagate them; a broken audit trail must not fail a signing operation.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    // ---
    async fn record(&self, event: AuditEvent);
}

/// Type alias for any backend that implements DocumentRepository.
pub type DocumentRepositoryPtr = Arc<dyn DocumentRepository>;

/// Type alias for any backend that implements CredentialRepository.
pub type CredentialRepositoryPtr = Arc<dyn CredentialRepository>;

/// Type alias for any backend that implements AuditSink.
pub type AuditSinkPtr = Arc<dyn AuditSink>;
