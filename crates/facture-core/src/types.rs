//! # Domain Types
//!
//! Core domain types used throughout Facture.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Client      │   │     Invoice     │   │   InvoiceItem   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  client_id (FK) │◄──│  invoice_id (FK)│       │
//! │  │  email (unique) │   │  invoice_number │   │  quantity       │       │
//! │  │  tax_id         │   │  sync           │   │  unit_price     │       │
//! │  │  vat_taxpayer   │   │  total / tax    │   │  total (store)  │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │                                       │
//! │                        ┌────────▼────────┐   ┌─────────────────┐       │
//! │                        │ TaxRegistration │   │     TaxRate     │       │
//! │                        │  ─────────────  │   │  ─────────────  │       │
//! │                        │  invoice_id (U) │   │  bps (u32)      │       │
//! │                        │  authority ref  │   │  1800 = 18%     │       │
//! │                        │  status         │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row structs derive `sqlx::FromRow` behind the `sqlx` feature so the
//! database crate can read them straight out of a query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so 18% VAT is exactly 1800 bps and
/// never touches floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Percentage code as the tax authority writes it: `"18"`, `"0"`, `"12.5"`.
    pub fn percent_code(&self) -> String {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            whole.to_string()
        } else if frac % 10 == 0 {
            format!("{}.{}", whole, frac / 10)
        } else {
            format!("{}.{:02}", whole, frac)
        }
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Enum Parsing Helper
// =============================================================================

fn not_allowed(field: &str, allowed: &[&str]) -> ValidationError {
    ValidationError::NotAllowed {
        field: field.to_string(),
        allowed: allowed.iter().map(|s| s.to_string()).collect(),
    }
}

// =============================================================================
// Client Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    Active,
    Inactive,
}

impl FromStr for ClientStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ClientStatus::Active),
            "inactive" => Ok(ClientStatus::Inactive),
            _ => Err(not_allowed("status", &["active", "inactive"])),
        }
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Payment status of an invoice (independent of the sync flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Paid,
    #[default]
    Pending,
    Overdue,
}

impl FromStr for InvoiceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paid" => Ok(InvoiceStatus::Paid),
            "pending" => Ok(InvoiceStatus::Pending),
            "overdue" => Ok(InvoiceStatus::Overdue),
            _ => Err(not_allowed("status", &["paid", "pending", "overdue"])),
        }
    }
}

// =============================================================================
// Invoice Type
// =============================================================================

/// Invoice type codes understood by the tax authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum InvoiceType {
    /// Normal invoice.
    #[default]
    #[serde(rename = "FN")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FN"))]
    Normal,
    /// Advance invoice.
    #[serde(rename = "FA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FA"))]
    Advance,
    /// Credit note.
    #[serde(rename = "RC")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "RC"))]
    CreditNote,
    /// Non-fiscal invoice.
    #[serde(rename = "RHF")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "RHF"))]
    NonFiscal,
}

impl InvoiceType {
    pub fn code(&self) -> &'static str {
        match self {
            InvoiceType::Normal => "FN",
            InvoiceType::Advance => "FA",
            InvoiceType::CreditNote => "RC",
            InvoiceType::NonFiscal => "RHF",
        }
    }
}

impl FromStr for InvoiceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FN" => Ok(InvoiceType::Normal),
            "FA" => Ok(InvoiceType::Advance),
            "RC" => Ok(InvoiceType::CreditNote),
            "RHF" => Ok(InvoiceType::NonFiscal),
            _ => Err(not_allowed("invoice_type", &["FN", "FA", "RC", "RHF"])),
        }
    }
}

// =============================================================================
// Payment Type
// =============================================================================

/// Payment type, stored and transmitted as its small integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum PaymentType {
    #[default]
    Cash = 1,
    CreditCard = 2,
    BankTransfer = 3,
    MobileMoney = 4,
    Other = 5,
}

impl PaymentType {
    /// Numeric code as a string (`"1"`..`"5"`), the wire representation.
    pub fn code(&self) -> String {
        (*self as i32).to_string()
    }

    pub fn from_code(code: i64) -> Result<Self, ValidationError> {
        match code {
            1 => Ok(PaymentType::Cash),
            2 => Ok(PaymentType::CreditCard),
            3 => Ok(PaymentType::BankTransfer),
            4 => Ok(PaymentType::MobileMoney),
            5 => Ok(PaymentType::Other),
            _ => Err(ValidationError::OutOfRange {
                field: "payment_type".to_string(),
                min: 1,
                max: 5,
            }),
        }
    }
}

impl FromStr for PaymentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.trim().parse::<i64>() {
            return PaymentType::from_code(code);
        }
        match s.to_lowercase().as_str() {
            "cash" => Ok(PaymentType::Cash),
            "credit_card" | "card" => Ok(PaymentType::CreditCard),
            "bank_transfer" | "bank" => Ok(PaymentType::BankTransfer),
            "mobile_money" | "mobile" => Ok(PaymentType::MobileMoney),
            "other" => Ok(PaymentType::Other),
            _ => Err(not_allowed(
                "payment_type",
                &["1", "2", "3", "4", "5", "cash", "credit_card", "bank_transfer", "mobile_money", "other"],
            )),
        }
    }
}

// =============================================================================
// Currency
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    #[default]
    Bif,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Bif => "BIF",
        }
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "BIF" => Ok(Currency::Bif),
            _ => Err(not_allowed("currency", &["EUR", "USD", "BIF"])),
        }
    }
}

// =============================================================================
// Fiscal Center
// =============================================================================

/// Tax-authority administrative center an invoice is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum FiscalCenter {
    Dgc,
    #[default]
    Dmc,
    Dpmc,
}

impl FiscalCenter {
    pub fn code(&self) -> &'static str {
        match self {
            FiscalCenter::Dgc => "DGC",
            FiscalCenter::Dmc => "DMC",
            FiscalCenter::Dpmc => "DPMC",
        }
    }
}

impl FromStr for FiscalCenter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DGC" => Ok(FiscalCenter::Dgc),
            "DMC" => Ok(FiscalCenter::Dmc),
            "DPMC" => Ok(FiscalCenter::Dpmc),
            _ => Err(not_allowed("fiscal_center", &["DGC", "DMC", "DPMC"])),
        }
    }
}

// =============================================================================
// Registration Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    #[default]
    Active,
    Canceled,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationStatus::Active => write!(f, "active"),
            RegistrationStatus::Canceled => write!(f, "canceled"),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// A customer invoices are issued to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    /// Customer tax identifier (TIN), unique when present.
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub status: ClientStatus,
    /// Whether VAT applies to this client's invoices.
    pub vat_taxpayer: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub vat_taxpayer: bool,
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice header.
///
/// `total_amount_cents` and `tax_amount_cents` are owned by the Totals
/// Engine: they always equal the aggregation over the current item set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: i64,
    /// Business number in `<sequence>/<year>` shape, e.g. `00042/2024`.
    pub invoice_number: String,
    pub client_id: i64,
    /// True once the tax authority registered the invoice.
    pub sync: bool,
    pub invoice_type: InvoiceType,
    pub payment_type: PaymentType,
    pub currency: Currency,
    pub fiscal_center: FiscalCenter,
    pub total_amount_cents: i64,
    pub tax_amount_cents: i64,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    #[inline]
    pub fn tax_amount(&self) -> Money {
        Money::from_cents(self.tax_amount_cents)
    }

    /// Amount before tax (`total - tax`).
    #[inline]
    pub fn subtotal(&self) -> Money {
        self.total_amount() - self.tax_amount()
    }
}

/// Fields for creating an invoice. Totals start at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub client_id: i64,
    #[serde(default)]
    pub invoice_type: InvoiceType,
    #[serde(default)]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub fiscal_center: FiscalCenter,
    #[serde(default)]
    pub status: InvoiceStatus,
    /// Issue timestamp; the store uses the current time when absent.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewInvoice {
    /// A pending normal invoice with default codes.
    pub fn new(invoice_number: impl Into<String>, client_id: i64) -> Self {
        NewInvoice {
            invoice_number: invoice_number.into(),
            client_id,
            invoice_type: InvoiceType::default(),
            payment_type: PaymentType::default(),
            currency: Currency::default(),
            fiscal_center: FiscalCenter::default(),
            status: InvoiceStatus::default(),
            created_at: None,
        }
    }
}

// =============================================================================
// Invoice Item
// =============================================================================

/// A line on an invoice.
///
/// `total_cents` is generated by the store (`quantity * unit_price_cents`);
/// nothing in the application writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

impl InvoiceItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// `quantity × unit_price`, computed here rather than trusted from the row.
    #[inline]
    pub fn line_total(&self) -> Result<Money, ValidationError> {
        self.unit_price()
            .checked_multiply_quantity(self.quantity)
            .ok_or_else(|| crate::totals::overflow("line_total"))
    }
}

/// Fields for adding an item to an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    pub invoice_id: i64,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
}

// =============================================================================
// Tax Registration
// =============================================================================

/// The local record of a successful registration with the tax authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TaxRegistration {
    pub id: i64,
    pub invoice_id: i64,
    /// The composite identifier that was submitted.
    pub invoice_identifier: String,
    /// Registration timestamp exactly as the authority returned it.
    pub registered_date: String,
    /// Authority registration number.
    pub authority_reference: Option<String>,
    pub status: RegistrationStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaxRegistration {
    pub fn is_canceled(&self) -> bool {
        self.status == RegistrationStatus::Canceled
    }
}

/// Fields for recording a registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaxRegistration {
    pub invoice_id: i64,
    pub invoice_identifier: String,
    pub registered_date: String,
    pub authority_reference: Option<String>,
}

// =============================================================================
// Listing & Reporting
// =============================================================================

/// Sort order for invoice listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvoiceSort {
    #[default]
    DateDesc,
    DateAsc,
    NumberAsc,
    NumberDesc,
    /// By stored total (tax included).
    AmountAsc,
    AmountDesc,
}

impl FromStr for InvoiceSort {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "date-desc" => Ok(InvoiceSort::DateDesc),
            "date-asc" => Ok(InvoiceSort::DateAsc),
            "number-asc" => Ok(InvoiceSort::NumberAsc),
            "number-desc" => Ok(InvoiceSort::NumberDesc),
            "amount-asc" => Ok(InvoiceSort::AmountAsc),
            "amount-desc" => Ok(InvoiceSort::AmountDesc),
            _ => Err(not_allowed(
                "sort",
                &[
                    "date-desc",
                    "date-asc",
                    "number-asc",
                    "number-desc",
                    "amount-asc",
                    "amount-desc",
                ],
            )),
        }
    }
}

/// Filter for invoice listings. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceFilter {
    pub client_id: Option<i64>,
    pub status: Option<InvoiceStatus>,
    pub synced: Option<bool>,
    /// Case-insensitive match on invoice number or client name.
    pub search: Option<String>,
    #[serde(default)]
    pub sort: InvoiceSort,
}

/// Dashboard figures over the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total_revenue: Money,
    pub total_tax: Money,
    pub invoice_count: i64,
    pub paid: i64,
    pub pending: i64,
    pub overdue: i64,
    pub synced: i64,
    pub unsynced: i64,
    pub active_clients: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
