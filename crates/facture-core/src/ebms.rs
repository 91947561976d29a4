//! # EBMS Transform
//!
//! Maps an invoice, its client and its items into the tax authority's
//! invoice submission schema.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Invoice ──────┐                                                       │
//! │   Client  ──────┼──► to_ebms_invoice() ──► EbmsInvoice ──► JSON body    │
//! │   [InvoiceItem] ┤         │                  ├── invoice_identifier     │
//! │   TaxpayerProfile         │                  └── invoice_items[]        │
//! │   username ─────┘         │                                             │
//! │                           └── tax_rate_for(client) drives item_tl/vat   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Purity
//! No clock, no randomness, no I/O. Every timestamp in the payload comes
//! from `invoice.created_at`, so identical inputs serialize to identical
//! bytes.
//!
//! ## Per-item VAT
//! ```text
//! item_price_nvat   = quantity × unit_price          (price excluding VAT)
//! vat               = round_half_up(nvat × rate)
//! item_price_wvat   = nvat + vat
//! item_total_amount = quantity × unit_price
//! ```
//! The same rate as the invoice header, taken from the Tax Rate Policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::tax_policy::tax_rate_for;
use crate::types::{Client, Invoice, InvoiceItem};

/// `invoice_date` format: `2024-03-05 10:15:30`.
pub const INVOICE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp segment of the invoice identifier: `20240305101530`.
pub const IDENTIFIER_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Width the sequence segment of the identifier is zero-padded to.
pub const IDENTIFIER_SEQUENCE_WIDTH: usize = 5;

// =============================================================================
// Taxpayer Profile
// =============================================================================

/// The issuing business as registered with the tax authority.
///
/// Deployment constants, loaded from configuration and injected here.
/// Field names match the `[taxpayer]` config table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxpayerProfile {
    /// Taxpayer type code (`"1"` natural person, `"2"` legal entity).
    pub tp_type: String,
    pub name: String,
    /// Taxpayer identification number.
    pub tin: String,
    pub trade_number: String,
    pub postal_number: String,
    pub phone_number: String,
    pub address_province: String,
    pub address_commune: String,
    pub address_quartier: String,
    pub address_avenue: String,
    pub address_rue: String,
    pub address_number: String,
    pub activity_sector: String,
    pub legal_form: String,
    /// Subject to the consumption tax (`"0"`/`"1"`).
    pub ct_taxpayer: String,
    /// Subject to the flat levy (`"0"`/`"1"`).
    pub tl_taxpayer: String,
    /// Tax category code written on every item (`item_ct`).
    pub item_tax_category: String,
}

impl Default for TaxpayerProfile {
    fn default() -> Self {
        TaxpayerProfile {
            tp_type: "1".to_string(),
            name: String::new(),
            tin: String::new(),
            trade_number: String::new(),
            postal_number: String::new(),
            phone_number: String::new(),
            address_province: String::new(),
            address_commune: String::new(),
            address_quartier: String::new(),
            address_avenue: String::new(),
            address_rue: String::new(),
            address_number: String::new(),
            activity_sector: String::new(),
            legal_form: String::new(),
            ct_taxpayer: "0".to_string(),
            tl_taxpayer: "0".to_string(),
            item_tax_category: "1".to_string(),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// Body of `POST /addInvoice_confirm/`.
///
/// Field order is the serialization order; keep it stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbmsInvoice {
    pub invoice_number: String,
    pub invoice_date: String,
    pub invoice_type: String,
    pub tp_type: String,
    pub tp_name: String,
    #[serde(rename = "tp_TIN")]
    pub tp_tin: String,
    pub tp_trade_number: String,
    pub tp_postal_number: String,
    pub tp_phone_number: String,
    pub tp_address_province: String,
    pub tp_address_commune: String,
    pub tp_address_quartier: String,
    pub tp_address_avenue: String,
    pub tp_address_rue: String,
    pub tp_address_number: String,
    pub vat_taxpayer: String,
    pub ct_taxpayer: String,
    pub tl_taxpayer: String,
    pub tp_fiscal_center: String,
    pub tp_activity_sector: String,
    pub tp_legal_form: String,
    pub payment_type: String,
    pub invoice_currency: String,
    pub customer_name: String,
    #[serde(rename = "customer_TIN")]
    pub customer_tin: String,
    pub customer_address: String,
    pub vat_customer_payer: String,
    pub invoice_identifier: String,
    pub invoice_items: Vec<EbmsInvoiceItem>,
}

/// One line of [`EbmsInvoice::invoice_items`]. Amounts are 2-decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbmsInvoiceItem {
    pub item_designation: String,
    pub item_quantity: String,
    pub item_price: String,
    pub item_ct: String,
    pub item_tl: String,
    pub item_price_nvat: String,
    pub vat: String,
    pub item_price_wvat: String,
    pub item_total_amount: String,
}

// =============================================================================
// Identifier
// =============================================================================

/// Extracts the sequence part of an invoice number (`"00042/2024"` → `"00042"`).
///
/// The part before the first `/` must be non-empty ASCII digits.
pub fn invoice_sequence(invoice_number: &str) -> Result<&str, ValidationError> {
    let sequence = invoice_number
        .trim()
        .split('/')
        .next()
        .unwrap_or_default();

    if sequence.is_empty() || !sequence.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "invoice_number".to_string(),
            reason: format!("'{}' has no numeric sequence before '/'", invoice_number),
        });
    }

    Ok(sequence)
}

/// Builds the composite identifier the authority keys invoices by.
///
/// ```text
/// {tin}/{username}/{created_at as YYYYMMDDHHMMSS, UTC}/{sequence padded to 5}
/// ```
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use facture_core::ebms::invoice_identifier;
///
/// let created = Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 30).unwrap();
/// let id = invoice_identifier("4000003568", "demo", created, "00042/2024").unwrap();
/// assert_eq!(id, "4000003568/demo/20240305101530/00042");
/// ```
pub fn invoice_identifier(
    tin: &str,
    username: &str,
    created_at: DateTime<Utc>,
    invoice_number: &str,
) -> Result<String, ValidationError> {
    let sequence = invoice_sequence(invoice_number)?;
    Ok(format!(
        "{}/{}/{}/{:0>width$}",
        tin,
        username,
        created_at.format(IDENTIFIER_TIMESTAMP_FORMAT),
        sequence,
        width = IDENTIFIER_SEQUENCE_WIDTH
    ))
}

// =============================================================================
// Transform
// =============================================================================

fn flag(value: bool) -> String {
    let code = if value { "1" } else { "0" };
    code.to_string()
}

/// Produces the submission payload for one invoice.
///
/// ## Errors
/// - [`CoreError::ClientMismatch`] if `client` is not the invoice's client
/// - [`CoreError::ForeignItem`] if an item belongs to another invoice
/// - [`CoreError::EmptyInvoice`] if `items` is empty
/// - [`CoreError::Validation`] if the invoice number has no numeric sequence
pub fn to_ebms_invoice(
    invoice: &Invoice,
    client: &Client,
    items: &[InvoiceItem],
    profile: &TaxpayerProfile,
    username: &str,
) -> CoreResult<EbmsInvoice> {
    if client.id != invoice.client_id {
        return Err(CoreError::ClientMismatch {
            invoice_id: invoice.id,
            client_id: client.id,
        });
    }
    if let Some(foreign) = items.iter().find(|i| i.invoice_id != invoice.id) {
        return Err(CoreError::ForeignItem {
            invoice_id: invoice.id,
            item_id: foreign.id,
        });
    }
    if items.is_empty() {
        return Err(CoreError::EmptyInvoice {
            invoice_id: invoice.id,
        });
    }

    let rate = tax_rate_for(client);
    let rate_code = rate.percent_code();

    let invoice_items = items
        .iter()
        .map(|item| -> CoreResult<EbmsInvoiceItem> {
            let nvat = item.line_total()?;
            let vat = nvat.calculate_tax(rate);
            let wvat = nvat
                .checked_add(vat)
                .ok_or_else(|| crate::totals::overflow("item_price_wvat"))?;
            Ok(EbmsInvoiceItem {
                item_designation: item.description.trim().to_string(),
                item_quantity: item.quantity.to_string(),
                item_price: item.unit_price().to_string(),
                item_ct: profile.item_tax_category.clone(),
                item_tl: rate_code.clone(),
                item_price_nvat: nvat.to_string(),
                vat: vat.to_string(),
                item_price_wvat: wvat.to_string(),
                item_total_amount: nvat.to_string(),
            })
        })
        .collect::<CoreResult<Vec<_>>>()?;

    Ok(EbmsInvoice {
        invoice_number: invoice.invoice_number.clone(),
        invoice_date: invoice.created_at.format(INVOICE_DATE_FORMAT).to_string(),
        invoice_type: invoice.invoice_type.code().to_string(),
        tp_type: profile.tp_type.clone(),
        tp_name: profile.name.clone(),
        tp_tin: profile.tin.clone(),
        tp_trade_number: profile.trade_number.clone(),
        tp_postal_number: profile.postal_number.clone(),
        tp_phone_number: profile.phone_number.clone(),
        tp_address_province: profile.address_province.clone(),
        tp_address_commune: profile.address_commune.clone(),
        tp_address_quartier: profile.address_quartier.clone(),
        tp_address_avenue: profile.address_avenue.clone(),
        tp_address_rue: profile.address_rue.clone(),
        tp_address_number: profile.address_number.clone(),
        vat_taxpayer: flag(client.vat_taxpayer),
        ct_taxpayer: profile.ct_taxpayer.clone(),
        tl_taxpayer: profile.tl_taxpayer.clone(),
        tp_fiscal_center: invoice.fiscal_center.code().to_string(),
        tp_activity_sector: profile.activity_sector.clone(),
        tp_legal_form: profile.legal_form.clone(),
        payment_type: invoice.payment_type.code(),
        invoice_currency: invoice.currency.code().to_string(),
        customer_name: client.name.clone(),
        customer_tin: client.tax_id.clone().unwrap_or_default(),
        customer_address: client.address.clone().unwrap_or_default(),
        vat_customer_payer: flag(client.vat_taxpayer),
        invoice_identifier: invoice_identifier(
            &profile.tin,
            username,
            invoice.created_at,
            &invoice.invoice_number,
        )?,
        invoice_items,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ClientStatus, Currency, FiscalCenter, InvoiceStatus, InvoiceType, PaymentType,
    };
    use chrono::TimeZone;

    fn profile() -> TaxpayerProfile {
        TaxpayerProfile {
            name: "CERTRAG".to_string(),
            tin: "4000003568".to_string(),
            trade_number: "65905".to_string(),
            phone_number: "79764778".to_string(),
            address_province: "BUJUMBURA".to_string(),
            address_commune: "NTAHANGWA".to_string(),
            address_quartier: "Kigobe".to_string(),
            address_avenue: "Rukambara".to_string(),
            address_number: "28".to_string(),
            activity_sector: "construction".to_string(),
            legal_form: "su".to_string(),
            ..TaxpayerProfile::default()
        }
    }

    fn client(vat_taxpayer: bool) -> Client {
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        Client {
            id: 3,
            name: "Ntahangwa Traders".to_string(),
            email: "ops@ntahangwa.bi".to_string(),
            phone: "79111222".to_string(),
            company: "Ntahangwa Traders SPRL".to_string(),
            tax_id: Some("4000111222".to_string()),
            address: Some("Avenue de l'Amitié 4".to_string()),
            status: ClientStatus::Active,
            vat_taxpayer,
            created_at: at,
            updated_at: at,
        }
    }

    fn invoice() -> Invoice {
        Invoice {
            id: 9,
            invoice_number: "00042/2024".to_string(),
            client_id: 3,
            sync: false,
            invoice_type: InvoiceType::Normal,
            payment_type: PaymentType::BankTransfer,
            currency: Currency::Bif,
            fiscal_center: FiscalCenter::Dmc,
            total_amount_cents: 23600,
            tax_amount_cents: 3600,
            status: InvoiceStatus::Pending,
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 30).unwrap(),
        }
    }

    fn items() -> Vec<InvoiceItem> {
        vec![
            InvoiceItem {
                id: 1,
                invoice_id: 9,
                description: "Cement bag".to_string(),
                quantity: 2,
                unit_price_cents: 5000,
                total_cents: 10000,
            },
            InvoiceItem {
                id: 2,
                invoice_id: 9,
                description: "Delivery".to_string(),
                quantity: 1,
                unit_price_cents: 10000,
                total_cents: 10000,
            },
        ]
    }

    #[test]
    fn test_identifier_format() {
        let created = Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 30).unwrap();
        let id = invoice_identifier("4000003568", "demo", created, "00042/2024").unwrap();
        assert_eq!(id, "4000003568/demo/20240305101530/00042");
    }

    #[test]
    fn test_identifier_pads_short_sequence() {
        let created = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let id = invoice_identifier("4000003568", "demo", created, "7/2024").unwrap();
        assert_eq!(id, "4000003568/demo/20241231235959/00007");
    }

    #[test]
    fn test_identifier_rejects_non_numeric_sequence() {
        let created = Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 30).unwrap();
        assert!(invoice_identifier("4000003568", "demo", created, "INV/2024").is_err());
        assert!(invoice_identifier("4000003568", "demo", created, "/2024").is_err());
    }

    #[test]
    fn test_transform_header_fields() {
        let payload = to_ebms_invoice(&invoice(), &client(true), &items(), &profile(), "demo").unwrap();

        assert_eq!(payload.invoice_number, "00042/2024");
        assert_eq!(payload.invoice_date, "2024-03-05 10:15:30");
        assert_eq!(payload.invoice_type, "FN");
        assert_eq!(payload.tp_tin, "4000003568");
        assert_eq!(payload.tp_fiscal_center, "DMC");
        assert_eq!(payload.payment_type, "3");
        assert_eq!(payload.invoice_currency, "BIF");
        assert_eq!(payload.customer_name, "Ntahangwa Traders");
        assert_eq!(payload.customer_tin, "4000111222");
        assert_eq!(payload.vat_taxpayer, "1");
        assert_eq!(payload.vat_customer_payer, "1");
        assert_eq!(payload.invoice_identifier, "4000003568/demo/20240305101530/00042");
    }

    #[test]
    fn test_transform_item_vat_split() {
        let payload = to_ebms_invoice(&invoice(), &client(true), &items(), &profile(), "demo").unwrap();

        let first = &payload.invoice_items[0];
        assert_eq!(first.item_designation, "Cement bag");
        assert_eq!(first.item_quantity, "2");
        assert_eq!(first.item_price, "50.00");
        assert_eq!(first.item_ct, "1");
        assert_eq!(first.item_tl, "18");
        assert_eq!(first.item_price_nvat, "100.00");
        assert_eq!(first.vat, "18.00");
        assert_eq!(first.item_price_wvat, "118.00");
        assert_eq!(first.item_total_amount, "100.00");
    }

    #[test]
    fn test_transform_non_vat_client() {
        let payload = to_ebms_invoice(&invoice(), &client(false), &items(), &profile(), "demo").unwrap();

        assert_eq!(payload.vat_taxpayer, "0");
        for item in &payload.invoice_items {
            assert_eq!(item.item_tl, "0");
            assert_eq!(item.vat, "0.00");
            assert_eq!(item.item_price_wvat, item.item_price_nvat);
        }
    }

    #[test]
    fn test_transform_wire_names() {
        let payload = to_ebms_invoice(&invoice(), &client(true), &items(), &profile(), "demo").unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["tp_TIN"], "4000003568");
        assert_eq!(json["customer_TIN"], "4000111222");
        assert!(json.get("tp_tin").is_none());
        assert_eq!(json["invoice_items"][1]["item_total_amount"], "100.00");
    }

    #[test]
    fn test_transform_is_pure() {
        let a = to_ebms_invoice(&invoice(), &client(true), &items(), &profile(), "demo").unwrap();
        let b = to_ebms_invoice(&invoice(), &client(true), &items(), &profile(), "demo").unwrap();

        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn test_transform_rejects_wrong_inputs() {
        let mut other_client = client(true);
        other_client.id = 99;
        assert!(matches!(
            to_ebms_invoice(&invoice(), &other_client, &items(), &profile(), "demo"),
            Err(CoreError::ClientMismatch { .. })
        ));

        let mut foreign = items();
        foreign[1].invoice_id = 10;
        assert!(matches!(
            to_ebms_invoice(&invoice(), &client(true), &foreign, &profile(), "demo"),
            Err(CoreError::ForeignItem { item_id: 2, .. })
        ));

        assert!(matches!(
            to_ebms_invoice(&invoice(), &client(true), &[], &profile(), "demo"),
            Err(CoreError::EmptyInvoice { .. })
        ));
    }
}
