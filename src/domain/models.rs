use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a user who may sign invoices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    // ---
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    // ---
    pub fn new(username: String) -> Self {
        // ---
        Self {
            id: Uuid::new_v4(),
            username,
            created_at: Utc::now(),
        }
    }
}

/// A registered signing credential (public key + replay counter) for a user.
///
/// The counter is monotonically non-decreasing for the lifetime of the
/// credential and is mutated only by the replay guard after a successful
/// verification. Credentials are never deleted; re-registration creates a
/// new credential record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    // ---
    /// Unique credential ID (from the authenticator)
    pub id: Vec<u8>,

    /// User this credential belongs to
    pub user_id: Uuid,

    /// Ed25519 public key (32 bytes) for assertion verification
    pub public_key: Vec<u8>,

    /// Signature counter (for replay attack prevention)
    pub counter: i64,

    /// When this credential was created
    pub created_at: DateTime<Utc>,
}

impl Credential {
    // ---
    pub fn new(id: Vec<u8>, user_id: Uuid, public_key: Vec<u8>, counter: i64) -> Self {
        // ---
        Self {
            id,
            user_id,
            public_key,
            counter,
            created_at: Utc::now(),
        }
    }
}

/// Invoice lifecycle states. `Signed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Signed,
    Cancelled,
}

impl InvoiceStatus {
    /// Stable storage representation, also used as the SQL enum text.
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Signed => "signed",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

/// A single invoice line. Monetary values are integer minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    // ---
    pub description: String,

    /// Must be greater than zero.
    pub quantity: u32,

    /// Unit rate in minor units, never negative.
    pub unit_rate_minor: i64,
}

impl LineItem {
    /// quantity x unit rate, computed exactly (no intermediate rounding).
    /// Only meaningful on invoices whose totals have passed the checked
    /// computation, which bounds the product to the minor-unit range.
    pub fn line_total_minor(&self) -> i64 {
        // ---
        i64::from(self.quantity) * self.unit_rate_minor
    }
}

/// How tax is applied to the invoice subtotal.
///
/// Rates are basis points (1% = 100 bp). `SplitRate` applies two equal
/// components (e.g. two 9% components instead of one 18%); the combined
/// effective rate is `2 * component_bp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TaxMode {
    SingleRate { rate_bp: u32 },
    SplitRate { component_bp: u32 },
}

/// One named component of the tax breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxComponent {
    // ---
    pub label: String,
    pub rate_bp: u32,
    pub amount_minor: i64,
}

/// Computed financial totals for an invoice, all in minor units.
///
/// Invariant: `grand_total = subtotal + total_tax - discount`, clamped at
/// zero with `clamped` set when the clamp fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    // ---
    pub subtotal_minor: i64,
    pub tax_components: Vec<TaxComponent>,
    pub total_tax_minor: i64,
    pub grand_total_minor: i64,
    pub clamped: bool,
}

/// The immutable record of a verified signing attempt.
///
/// Stored inside the invoice row and written in the same conditional update
/// that flips the status to `Signed`, so the two can never diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRecord {
    // ---
    pub document_id: Uuid,
    pub signer_user_id: Uuid,
    pub signer_name: String,

    /// The challenge bytes this assertion answered.
    pub challenge: Vec<u8>,

    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,

    /// Human-readable attestation line embedded in the artifact.
    pub attestation: String,
}

/// An invoice document. Created in `Draft`; mutated by this service only
/// during the sign or cancel transitions. Line items and totals are frozen
/// once the status is `Signed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    // ---
    pub id: Uuid,
    pub status: InvoiceStatus,
    pub line_items: Vec<LineItem>,
    pub tax_mode: TaxMode,

    /// Flat discount in minor units, never negative.
    pub discount_minor: i64,

    pub totals: Totals,
    pub signature: Option<SignatureRecord>,

    /// Hex SHA-256 of the rendered artifact bytes. `None` while the invoice
    /// is unsigned or while artifact rendering is pending after a degraded
    /// sign (retryable via the artifact endpoint).
    pub artifact_ref: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// The fields a sign or cancel transition is allowed to change, applied
/// atomically by `DocumentRepository::conditional_update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePatch {
    // ---
    pub status: InvoiceStatus,
    pub totals: Option<Totals>,
    pub signature: Option<SignatureRecord>,
    pub artifact_ref: Option<String>,
}

impl InvoicePatch {
    /// Patch for the Draft -> Cancelled transition.
    pub fn cancelled() -> Self {
        // ---
        Self {
            status: InvoiceStatus::Cancelled,
            totals: None,
            signature: None,
            artifact_ref: None,
        }
    }
}

/// An event recorded to the audit sink. Carries enough to reconstruct the
/// attempt but never raw credential material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    // ---
    pub kind: String,
    pub entity_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    // ---
    pub fn new(kind: &str, entity_id: Uuid, actor_id: Option<Uuid>, description: String) -> Self {
        // ---
        Self {
            kind: kind.to_string(),
            entity_id,
            actor_id,
            description,
            timestamp: Utc::now(),
        }
    }
}
