//! # Tax Rate Policy
//!
//! Maps a client's VAT registration to the rate applied to its invoices.
//!
//! ```text
//! ┌──────────────────────────────┬──────────────┐
//! │ client.vat_taxpayer          │ rate         │
//! ├──────────────────────────────┼──────────────┤
//! │ false (0)                    │ 0%           │
//! │ true  (1)                    │ 18% (1800bps)│
//! └──────────────────────────────┴──────────────┘
//! ```
//!
//! Exactly two outcomes. The policy takes a resolved [`Client`]; a missing
//! client is the caller's NotFound, never a silent default rate.

use crate::types::{Client, TaxRate};

/// Standard VAT rate applied to VAT-registered clients.
pub const STANDARD_VAT_RATE: TaxRate = TaxRate::from_bps(1800);

/// Returns the rate for a VAT flag.
#[inline]
pub const fn rate_for_vat_flag(vat_taxpayer: bool) -> TaxRate {
    if vat_taxpayer {
        STANDARD_VAT_RATE
    } else {
        TaxRate::zero()
    }
}

/// Returns the rate that applies to `client`'s invoices.
///
/// ```rust,ignore
/// let rate = tax_rate_for(&client);
/// let tax = subtotal.calculate_tax(rate);
/// ```
#[inline]
pub fn tax_rate_for(client: &Client) -> TaxRate {
    rate_for_vat_flag(client.vat_taxpayer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientStatus;
    use chrono::Utc;

    fn client(vat_taxpayer: bool) -> Client {
        Client {
            id: 1,
            name: "Rukambara Builders".to_string(),
            email: "office@rukambara.bi".to_string(),
            phone: "79764778".to_string(),
            company: "Rukambara SU".to_string(),
            tax_id: None,
            address: None,
            status: ClientStatus::Active,
            vat_taxpayer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_non_vat_client_pays_no_tax() {
        assert_eq!(tax_rate_for(&client(false)), TaxRate::zero());
    }

    #[test]
    fn test_vat_client_pays_standard_rate() {
        assert_eq!(tax_rate_for(&client(true)).bps(), 1800);
    }
}
