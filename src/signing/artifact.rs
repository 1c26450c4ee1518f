//! Rendering of the permanent signed artifact.
//!
//! The artifact is a pure function of the frozen invoice, the signer's
//! display name, and the signing timestamp. Re-rendering the same inputs is
//! byte-identical, which is what makes the artifact auditable: anyone
//! holding the frozen document can recompute the bytes and compare the
//! content address.

use crate::domain::{Invoice, InvoiceStatus};
use crate::signing::SignError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Renders invoice artifacts. Optionally embeds a signature glyph image; in
/// its absence the renderer degrades to a textual signer label rather than
/// failing the render.
#[derive(Default)]
pub struct ArtifactRenderer {
    // ---
    signature_glyph: Option<Vec<u8>>,
}

impl ArtifactRenderer {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    pub fn with_signature_glyph(glyph: Vec<u8>) -> Self {
        // ---
        Self {
            signature_glyph: Some(glyph),
        }
    }

    /// Render the artifact bytes for a signed invoice.
    ///
    /// `signed_at` is passed in rather than read from a clock so re-renders
    /// reproduce the original bytes. Errors only on structural impossibility
    /// (an invoice that is not in the Signed state).
    pub fn render(
        &self,
        invoice: &Invoice,
        signer_name: &str,
        signed_at: DateTime<Utc>,
    ) -> Result<Vec<u8>, SignError> {
        // ---
        if invoice.status != InvoiceStatus::Signed {
            return Err(SignError::InvalidState);
        }

        let mut out = String::new();
        let _ = writeln!(out, "================================================");
        let _ = writeln!(out, "                 SIGNED INVOICE");
        let _ = writeln!(out, "================================================");
        let _ = writeln!(out, "Invoice:   {}", invoice.id);
        let _ = writeln!(
            out,
            "Signed at: {}",
            signed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<30} {:>6} {:>10} {:>12}", "Description", "Qty", "Rate", "Total");
        let _ = writeln!(out, "------------------------------------------------");

        for item in &invoice.line_items {
            let _ = writeln!(
                out,
                "{:<30} {:>6} {:>10} {:>12}",
                item.description,
                item.quantity,
                format_minor(item.unit_rate_minor),
                format_minor(item.line_total_minor()),
            );
        }

        let totals = &invoice.totals;
        let _ = writeln!(out, "------------------------------------------------");
        let _ = writeln!(out, "{:<38} {:>12}", "Subtotal", format_minor(totals.subtotal_minor));
        for component in &totals.tax_components {
            let label = format!(
                "{} ({}.{:02}%)",
                component.label,
                component.rate_bp / 100,
                component.rate_bp % 100
            );
            let _ = writeln!(out, "{:<38} {:>12}", label, format_minor(component.amount_minor));
        }
        if invoice.discount_minor > 0 {
            let _ = writeln!(
                out,
                "{:<38} {:>12}",
                "Discount",
                format!("-{}", format_minor(invoice.discount_minor))
            );
        }
        let _ = writeln!(
            out,
            "{:<38} {:>12}",
            "GRAND TOTAL",
            format_minor(totals.grand_total_minor)
        );
        if totals.clamped {
            let _ = writeln!(out, "(grand total clamped at zero)");
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "------------------------------------------------");
        match &self.signature_glyph {
            Some(glyph) => {
                let _ = writeln!(out, "Signature: data:image/png;base64,{}", STANDARD.encode(glyph));
                let _ = writeln!(out, "Signed by: {signer_name}");
            }
            None => {
                // Textual fallback when no signature image is available.
                let _ = writeln!(out, "Signed by: /s/ {signer_name}");
            }
        }
        if let Some(signature) = &invoice.signature {
            let _ = writeln!(out, "{}", signature.attestation);
        }
        let _ = writeln!(out, "================================================");

        Ok(out.into_bytes())
    }
}

/// Content address of an artifact: hex SHA-256 of its bytes.
pub fn artifact_ref(bytes: &[u8]) -> String {
    // ---
    hex::encode(Sha256::digest(bytes))
}

/// Format minor units as a decimal string with two fraction digits.
fn format_minor(minor: i64) -> String {
    // ---
    format!("{}.{:02}", minor / 100, (minor % 100).abs())
}
