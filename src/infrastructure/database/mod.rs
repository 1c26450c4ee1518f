mod postgres_repository;

pub use postgres_repository::{
    create_postgres_audit_sink, create_postgres_credential_repository,
    create_postgres_document_repository, PostgresAuditSink, PostgresCredentialRepository,
    PostgresDocumentRepository,
};
