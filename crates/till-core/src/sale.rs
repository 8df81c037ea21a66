//! # Sale Aggregate Rules
//!
//! The status table and totals recalculation for a sale. Both are pure so the
//! database layer can apply them inside whatever transaction it holds.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │            hold                                                         │
//! │   DRAFT ─────────► HELD                                                 │
//! │     ▲  ◄─────────   │        edit / transfer / merge keep the status   │
//! │     │    resume     │                                                   │
//! │     │               │                                                   │
//! │     ├── complete ───┼──────────► COMPLETED ── void ──► VOIDED          │
//! │     │               │                                     ▲             │
//! │     └── void ───────┴─────────────────────────────────────┘             │
//! │                                                                         │
//! │   delete: DRAFT / HELD only (row removed)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{SaleItem, SaleStatus, TaxRate};

/// Operations that are gated by the sale's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleOperation {
    EditItems,
    UpdateDetails,
    Hold,
    Resume,
    Transfer,
    Merge,
    Complete,
    Void,
    Delete,
}

impl SaleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleOperation::EditItems => "edit items of",
            SaleOperation::UpdateDetails => "update",
            SaleOperation::Hold => "hold",
            SaleOperation::Resume => "resume",
            SaleOperation::Transfer => "transfer",
            SaleOperation::Merge => "merge",
            SaleOperation::Complete => "complete",
            SaleOperation::Void => "void",
            SaleOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for SaleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the status a sale ends up in after `operation`, or `InvalidState`.
///
/// `Delete` returns the current status; the caller removes the row.
///
/// ## Example
/// ```rust
/// use till_core::sale::{next_status, SaleOperation};
/// use till_core::SaleStatus;
///
/// assert_eq!(next_status(SaleStatus::Draft, SaleOperation::Hold).unwrap(), SaleStatus::Held);
/// assert!(next_status(SaleStatus::Voided, SaleOperation::Void).is_err());
/// ```
pub fn next_status(current: SaleStatus, operation: SaleOperation) -> CoreResult<SaleStatus> {
    use SaleOperation as Op;
    use SaleStatus as S;

    let next = match (current, operation) {
        (S::Draft | S::Held, Op::EditItems | Op::UpdateDetails | Op::Transfer | Op::Merge | Op::Delete) => {
            Some(current)
        }
        (S::Draft, Op::Hold) => Some(S::Held),
        (S::Held, Op::Resume) => Some(S::Draft),
        (S::Draft | S::Held, Op::Complete) => Some(S::Completed),
        (S::Draft | S::Held | S::Completed, Op::Void) => Some(S::Voided),
        _ => None,
    };

    next.ok_or_else(|| CoreError::invalid_state(operation.as_str(), current))
}

// =============================================================================
// Totals
// =============================================================================

/// Recalculated sale totals.
///
/// ## Invariants
/// - `subtotal == Σ(item.line_total)`
/// - `total == subtotal − discount + tax`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
}

impl SaleTotals {
    /// Computes totals from the full item set. Tax applies to the subtotal
    /// before discount, so `pre-discount total − discount` equals the final
    /// total.
    pub fn compute(items: &[SaleItem], rate: TaxRate, discount: Money) -> Self {
        let subtotal: Money = items.iter().map(SaleItem::line_total).sum();
        let tax = subtotal.tax_at(rate);
        SaleTotals {
            subtotal,
            tax,
            discount,
            total: subtotal - discount + tax,
        }
    }
}

/// Line total for a quantity at a snapshotted unit price.
#[inline]
pub fn line_total(unit_price: Money, quantity: i64) -> Money {
    unit_price.times(quantity)
}

/// Change due to the customer; `InsufficientPayment` if short.
pub fn change_due(net_total: Money, amount_paid: Money) -> CoreResult<Money> {
    if amount_paid < net_total {
        return Err(CoreError::InsufficientPayment {
            due_cents: net_total.cents(),
            paid_cents: amount_paid.cents(),
        });
    }
    Ok(amount_paid - net_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(product: &str, unit: i64, qty: i64) -> SaleItem {
        SaleItem {
            id: format!("item-{product}"),
            sale_id: "sale-1".to_string(),
            product_id: product.to_string(),
            name_snapshot: product.to_uppercase(),
            unit_price_cents: unit,
            quantity: qty,
            line_total_cents: unit * qty,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_sales_accept_edits() {
        for status in [SaleStatus::Draft, SaleStatus::Held] {
            for op in [
                SaleOperation::EditItems,
                SaleOperation::Transfer,
                SaleOperation::Merge,
                SaleOperation::UpdateDetails,
            ] {
                assert_eq!(next_status(status, op).unwrap(), status);
            }
        }
    }

    #[test]
    fn test_terminal_sales_reject_edits() {
        for status in [SaleStatus::Completed, SaleStatus::Voided] {
            let err = next_status(status, SaleOperation::EditItems).unwrap_err();
            assert!(matches!(err, CoreError::InvalidState { status: s, .. } if s == status));
        }
    }

    #[test]
    fn test_hold_resume_pairing() {
        assert_eq!(next_status(SaleStatus::Draft, SaleOperation::Hold).unwrap(), SaleStatus::Held);
        assert!(next_status(SaleStatus::Held, SaleOperation::Hold).is_err());
        assert_eq!(next_status(SaleStatus::Held, SaleOperation::Resume).unwrap(), SaleStatus::Draft);
        assert!(next_status(SaleStatus::Draft, SaleOperation::Resume).is_err());
    }

    #[test]
    fn test_void_transitions() {
        assert_eq!(next_status(SaleStatus::Completed, SaleOperation::Void).unwrap(), SaleStatus::Voided);
        assert!(next_status(SaleStatus::Voided, SaleOperation::Void).is_err());
        assert!(next_status(SaleStatus::Completed, SaleOperation::Complete).is_err());
        assert!(next_status(SaleStatus::Completed, SaleOperation::Delete).is_err());
    }

    #[test]
    fn test_error_names_operation_and_status() {
        let err = next_status(SaleStatus::Completed, SaleOperation::Merge).unwrap_err();
        assert_eq!(err.to_string(), "Cannot merge a sale in completed status");
    }

    #[test]
    fn test_totals_match_items() {
        let items = vec![item("x", 1500, 5), item("y", 250, 2)];
        let totals = SaleTotals::compute(&items, TaxRate::from_bps(1000), Money::from_cents(500));

        assert_eq!(totals.subtotal.cents(), 8000);
        assert_eq!(totals.tax.cents(), 800);
        assert_eq!(totals.total, totals.subtotal - totals.discount + totals.tax);
        assert_eq!(totals.total.cents(), 8300);
    }

    #[test]
    fn test_totals_empty_sale() {
        let totals = SaleTotals::compute(&[], TaxRate::from_bps(825), Money::zero());
        assert!(totals.subtotal.is_zero());
        assert!(totals.total.is_zero());
    }

    #[test]
    fn test_change_due() {
        let net = Money::from_cents(7500);
        assert_eq!(change_due(net, Money::from_cents(7500)).unwrap().cents(), 0);
        assert_eq!(change_due(net, Money::from_cents(8000)).unwrap().cents(), 500);
        assert!(matches!(
            change_due(net, Money::from_cents(7499)),
            Err(CoreError::InsufficientPayment { due_cents: 7500, paid_cents: 7499 })
        ));
    }
}
