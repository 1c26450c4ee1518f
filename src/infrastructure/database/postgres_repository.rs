use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    AuditEvent, AuditSink, Credential, CredentialRepository, DocumentRepository, Invoice,
    InvoicePatch, InvoiceStatus, LineItem, SignatureRecord, TaxMode, Totals, User,
};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Vec<u8>,
    user_id: Uuid,
    public_key: Vec<u8>,
    counter: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    status: String,
    line_items: Json<Vec<LineItem>>,
    tax_mode: Json<TaxMode>,
    discount_minor: i64,
    totals: Json<Totals>,
    signature: Option<Json<SignatureRecord>>,
    artifact_ref: Option<String>,
    created_at: DateTime<Utc>,
}

fn parse_status(text: &str) -> Result<InvoiceStatus> {
    // ---
    match text {
        "draft" => Ok(InvoiceStatus::Draft),
        "signed" => Ok(InvoiceStatus::Signed),
        "cancelled" => Ok(InvoiceStatus::Cancelled),
        other => anyhow::bail!("unknown invoice status '{other}'"),
    }
}

impl InvoiceRow {
    fn into_invoice(self) -> Result<Invoice> {
        // ---
        Ok(Invoice {
            id: self.id,
            status: parse_status(&self.status)?,
            line_items: self.line_items.0,
            tax_mode: self.tax_mode.0,
            discount_minor: self.discount_minor,
            totals: self.totals.0,
            signature: self.signature.map(|json| json.0),
            artifact_ref: self.artifact_ref,
            created_at: self.created_at,
        })
    }
}

pub fn create_postgres_document_repository(pool: PgPool) -> impl DocumentRepository {
    // ---
    PostgresDocumentRepository::new(pool)
}

pub fn create_postgres_credential_repository(pool: PgPool) -> impl CredentialRepository {
    // ---
    PostgresCredentialRepository::new(pool)
}

pub fn create_postgres_audit_sink(pool: PgPool) -> impl AuditSink {
    // ---
    PostgresAuditSink::new(pool)
}

pub struct PostgresDocumentRepository {
    // ---
    pool: PgPool,
}

impl PostgresDocumentRepository {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    // ---
    async fn create(&self, invoice: Invoice) -> Result<()> {
        // ---
        sqlx::query(
            "INSERT INTO invoices
                (id, status, line_items, tax_mode, discount_minor, totals,
                 signature, artifact_ref, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(invoice.id)
        .bind(invoice.status.as_str())
        .bind(Json(&invoice.line_items))
        .bind(Json(&invoice.tax_mode))
        .bind(invoice.discount_minor)
        .bind(Json(&invoice.totals))
        .bind(invoice.signature.as_ref().map(Json))
        .bind(&invoice.artifact_ref)
        .bind(invoice.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>> {
        // ---
        let row = sqlx::query_as::<_, InvoiceRow>(
            "SELECT id, status, line_items, tax_mode, discount_minor, totals,
                    signature, artifact_ref, created_at
             FROM invoices WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(InvoiceRow::into_invoice).transpose()
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected: InvoiceStatus,
        patch: InvoicePatch,
    ) -> Result<bool> {
        // ---
        // Single conditional UPDATE: the WHERE clause carries the expected
        // status, so concurrent sign attempts race on the database's row
        // lock and at most one sees rows_affected = 1.
        let result = sqlx::query(
            "UPDATE invoices
             SET status = $3,
                 totals = COALESCE($4, totals),
                 signature = COALESCE($5, signature),
                 artifact_ref = COALESCE($6, artifact_ref)
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(patch.status.as_str())
        .bind(patch.totals.as_ref().map(Json))
        .bind(patch.signature.as_ref().map(Json))
        .bind(&patch.artifact_ref)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

pub struct PostgresCredentialRepository {
    // ---
    pool: PgPool,
}

impl PostgresCredentialRepository {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    // ---
    async fn create_user(&self, username: &str) -> Result<User> {
        // ---
        let user = User::new(username.to_string());

        sqlx::query("INSERT INTO users (id, username, created_at) VALUES ($1, $2, $3)")
            .bind(user.id)
            .bind(&user.username)
            .bind(user.created_at)
            .execute(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        // ---
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| User {
            id: r.id,
            username: r.username,
            created_at: r.created_at,
        }))
    }

    async fn save_credential(&self, credential: Credential) -> Result<()> {
        // ---
        sqlx::query(
            "INSERT INTO credentials (id, user_id, public_key, counter, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&credential.id)
        .bind(credential.user_id)
        .bind(&credential.public_key)
        .bind(credential.counter)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Credential>> {
        // ---
        // Single credential per user baseline: newest wins if re-registered.
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, user_id, public_key, counter, created_at
             FROM credentials WHERE user_id = $1
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Credential {
            id: r.id,
            user_id: r.user_id,
            public_key: r.public_key,
            counter: r.counter,
            created_at: r.created_at,
        }))
    }

    async fn update_counter(&self, credential_id: &[u8], new_counter: i64) -> Result<()> {
        // ---
        // The counter guard makes the persisted value monotone even when
        // two processes race distinct verifications: a stale writer simply
        // matches no row.
        sqlx::query("UPDATE credentials SET counter = $1 WHERE id = $2 AND counter < $1")
            .bind(new_counter)
            .bind(credential_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

pub struct PostgresAuditSink {
    // ---
    pool: PgPool,
}

impl PostgresAuditSink {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditSink for PostgresAuditSink {
    // ---
    async fn record(&self, event: AuditEvent) {
        // ---
        // Fire-and-forget: audit failures are logged, never propagated.
        let result = sqlx::query(
            "INSERT INTO audit_events (kind, entity_id, actor_id, description, recorded_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&event.kind)
        .bind(event.entity_id)
        .bind(event.actor_id)
        .bind(&event.description)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            tracing::error!("Failed to record audit event '{}': {:?}", event.kind, err);
        }
    }
}
