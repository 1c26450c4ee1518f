//! Deterministic tax and totals computation.
//!
//! Pure functions over integer minor units. No floating point anywhere:
//! the sign-time recomputation and the rendered figures must agree to the
//! exact minor unit, every time, on every machine.

use crate::domain::{LineItem, TaxComponent, TaxMode, Totals};
use crate::signing::SignError;

/// Basis points in a whole (100%).
const BP_DENOMINATOR: i128 = 10_000;

/// Highest accepted combined tax rate (100%). Bounding the rate here keeps
/// every downstream product within `i64` once the subtotal has been
/// range-checked.
const MAX_RATE_BP: u32 = 10_000;

/// Compute subtotal, tax breakdown, and grand total for a set of line items.
///
/// Rules:
/// - each line total is quantity x unit rate, exact; the subtotal is their
///   sum with no intermediate re-rounding;
/// - tax is computed once at the combined effective rate with half-up
///   rounding at the minor unit. Split mode divides that amount into two
///   components (the first takes the odd minor unit), so single-rate and
///   split-rate at the same effective rate always yield the same total tax;
/// - grand total = subtotal + tax - discount, clamped at zero with the
///   `clamped` flag set rather than allowing a negative invoice;
/// - every multiplication and sum is checked; amounts or rates that would
///   overflow the minor-unit range are rejected as `InvalidRequest`, never
///   wrapped or panicked on.
pub fn compute(
    line_items: &[LineItem],
    tax_mode: TaxMode,
    discount_minor: i64,
) -> Result<Totals, SignError> {
    // ---
    if line_items.is_empty() {
        return Err(SignError::InvalidRequest(
            "invoice has no line items".to_string(),
        ));
    }
    if discount_minor < 0 {
        return Err(SignError::InvalidRequest(
            "discount must not be negative".to_string(),
        ));
    }

    let mut subtotal: i64 = 0;
    for (index, item) in line_items.iter().enumerate() {
        if item.quantity == 0 {
            return Err(SignError::InvalidRequest(format!(
                "line {index}: quantity must be greater than zero"
            )));
        }
        if item.unit_rate_minor < 0 {
            return Err(SignError::InvalidRequest(format!(
                "line {index}: unit rate must not be negative"
            )));
        }
        let line_total = i64::from(item.quantity)
            .checked_mul(item.unit_rate_minor)
            .ok_or_else(|| {
                SignError::InvalidRequest(format!("line {index}: line total overflow"))
            })?;
        subtotal = subtotal
            .checked_add(line_total)
            .ok_or_else(|| SignError::InvalidRequest("subtotal overflow".to_string()))?;
    }

    let combined_bp = match tax_mode {
        TaxMode::SingleRate { rate_bp } => rate_bp,
        TaxMode::SplitRate { component_bp } => component_bp
            .checked_mul(2)
            .ok_or_else(|| SignError::InvalidRequest("tax rate overflow".to_string()))?,
    };
    if combined_bp > MAX_RATE_BP {
        return Err(SignError::InvalidRequest(format!(
            "combined tax rate {combined_bp} bp exceeds 100%"
        )));
    }

    let total_tax = tax_at(subtotal, combined_bp);

    let tax_components = match tax_mode {
        TaxMode::SingleRate { rate_bp } => vec![TaxComponent {
            label: "Tax".to_string(),
            rate_bp,
            amount_minor: total_tax,
        }],
        TaxMode::SplitRate { component_bp } => {
            // Derive both halves from the combined amount so the split mode
            // is minor-unit identical to the single mode.
            let first = (total_tax + 1) / 2;
            let second = total_tax - first;
            vec![
                TaxComponent {
                    label: "Tax (component 1)".to_string(),
                    rate_bp: component_bp,
                    amount_minor: first,
                },
                TaxComponent {
                    label: "Tax (component 2)".to_string(),
                    rate_bp: component_bp,
                    amount_minor: second,
                },
            ]
        }
    };

    let raw_grand_total = subtotal
        .checked_add(total_tax)
        .and_then(|v| v.checked_sub(discount_minor))
        .ok_or_else(|| SignError::InvalidRequest("grand total overflow".to_string()))?;
    let clamped = raw_grand_total < 0;

    Ok(Totals {
        subtotal_minor: subtotal,
        tax_components,
        total_tax_minor: total_tax,
        grand_total_minor: raw_grand_total.max(0),
        clamped,
    })
}

/// Tax on `amount` at `rate_bp` basis points, rounded half-up at the minor
/// unit. Widened to i128 so the product cannot overflow; with the rate
/// bounded at 100% the result never exceeds `amount`, so narrowing back
/// to i64 is lossless.
fn tax_at(amount: i64, rate_bp: u32) -> i64 {
    // ---
    let product = i128::from(amount) * i128::from(rate_bp);
    let rounded = (product + BP_DENOMINATOR / 2) / BP_DENOMINATOR;
    rounded as i64
}
