//! # Invoice Totals
//!
//! The one formula every invoice total in the system goes through.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   subtotal = Σ (quantity × unit_price)      exact, integer cents        │
//! │   tax      = round_half_up(subtotal × rate) rounded once, to the cent   │
//! │   total    = subtotal + tax                                             │
//! │                                                                         │
//! │   items [{2 × 50.00}, {1 × 100.00}], rate 18%                          │
//! │     → subtotal 200.00, tax 36.00, total 236.00                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step is checked: an item set whose totals do not fit in `i64` cents
//! is rejected with [`ValidationError::OutOfRange`] instead of wrapping.
//!
//! This module is pure. The transactional side (insert/delete + write-back)
//! lives in `facture_db::totals::TotalsEngine`, which calls [`InvoiceTotals::compute`].

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{InvoiceItem, TaxRate};

/// Totals derived from an invoice's item set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub rate: TaxRate,
}

impl InvoiceTotals {
    /// Computes totals over the full item set at `rate`.
    pub fn compute(items: &[InvoiceItem], rate: TaxRate) -> Result<Self, ValidationError> {
        let mut subtotal = Money::zero();
        for item in items {
            subtotal = subtotal
                .checked_add(item.line_total()?)
                .ok_or_else(|| overflow("subtotal"))?;
        }
        Self::from_subtotal(subtotal, rate)
    }

    /// Computes totals from an already aggregated subtotal.
    pub fn from_subtotal(subtotal: Money, rate: TaxRate) -> Result<Self, ValidationError> {
        let tax = subtotal.calculate_tax(rate);
        let total = subtotal.checked_add(tax).ok_or_else(|| overflow("total"))?;
        Ok(InvoiceTotals {
            subtotal,
            tax,
            total,
            rate,
        })
    }

    /// Totals of an invoice without items.
    pub fn empty(rate: TaxRate) -> Self {
        InvoiceTotals {
            subtotal: Money::zero(),
            tax: Money::zero(),
            total: Money::zero(),
            rate,
        }
    }
}

pub(crate) fn overflow(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax_policy::STANDARD_VAT_RATE;

    fn item(id: i64, quantity: i64, unit_price_cents: i64) -> InvoiceItem {
        InvoiceItem {
            id,
            invoice_id: 1,
            description: format!("line {}", id),
            quantity,
            unit_price_cents,
            total_cents: quantity * unit_price_cents,
        }
    }

    #[test]
    fn test_vat_client_totals() {
        let items = vec![item(1, 2, 5000), item(2, 1, 10000)];
        let totals = InvoiceTotals::compute(&items, STANDARD_VAT_RATE).unwrap();

        assert_eq!(totals.subtotal.to_string(), "200.00");
        assert_eq!(totals.tax.to_string(), "36.00");
        assert_eq!(totals.total.to_string(), "236.00");
    }

    #[test]
    fn test_non_vat_client_totals() {
        let items = vec![item(1, 2, 5000), item(2, 1, 10000)];
        let totals = InvoiceTotals::compute(&items, TaxRate::zero()).unwrap();

        assert_eq!(totals.subtotal.cents(), 20000);
        assert_eq!(totals.tax.cents(), 0);
        assert_eq!(totals.total.cents(), 20000);
    }

    #[test]
    fn test_empty_invoice() {
        let totals = InvoiceTotals::compute(&[], STANDARD_VAT_RATE).unwrap();
        assert_eq!(totals, InvoiceTotals::empty(STANDARD_VAT_RATE));
        assert!(totals.total.is_zero());
    }

    #[test]
    fn test_tax_rounded_once_on_subtotal() {
        // Per-line rounding would give 3 × round(0.18 × 0.25) = 3 × 0.05 = 0.15.
        // Rounding the subtotal once gives round(0.18 × 0.75) = 0.14.
        let items = vec![item(1, 1, 25), item(2, 1, 25), item(3, 1, 25)];
        let totals = InvoiceTotals::compute(&items, STANDARD_VAT_RATE).unwrap();
        assert_eq!(totals.tax.cents(), 14);
        assert_eq!(totals.total.cents(), 89);
    }

    #[test]
    fn test_overflowing_item_set_is_rejected() {
        use crate::{MAX_ITEM_QUANTITY, MAX_UNIT_PRICE_CENTS};

        let max_line = item(1, MAX_ITEM_QUANTITY, MAX_UNIT_PRICE_CENTS);
        let totals = InvoiceTotals::compute(&[max_line.clone()], STANDARD_VAT_RATE).unwrap();
        assert_eq!(totals.subtotal.cents(), MAX_ITEM_QUANTITY * MAX_UNIT_PRICE_CENTS);

        // Ten maximal lines exceed i64::MAX cents.
        let items: Vec<_> = (1..=10)
            .map(|id| item(id, MAX_ITEM_QUANTITY, MAX_UNIT_PRICE_CENTS))
            .collect();
        assert!(matches!(
            InvoiceTotals::compute(&items, STANDARD_VAT_RATE),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "subtotal"
        ));

        // A subtotal that fits can still overflow once tax is added.
        assert!(matches!(
            InvoiceTotals::from_subtotal(Money::from_cents(i64::MAX - 1), STANDARD_VAT_RATE),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "total"
        ));

        // A corrupted row whose product does not fit is rejected too.
        let corrupt = InvoiceItem {
            quantity: 3,
            unit_price_cents: i64::MAX / 2,
            ..item(1, 1, 0)
        };
        assert!(InvoiceTotals::compute(&[corrupt], TaxRate::zero()).is_err());
    }
}
