mod metrics;
mod models;
mod repository;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr};

// Publicly expose the persistence abstractions
pub use repository::{
    AuditSink, AuditSinkPtr, CredentialRepository, CredentialRepositoryPtr, DocumentRepository,
    DocumentRepositoryPtr,
};

// Publicly expose the domain models
pub use models::{
    AuditEvent, Credential, Invoice, InvoicePatch, InvoiceStatus, LineItem, SignatureRecord,
    TaxComponent, TaxMode, Totals, User,
};
