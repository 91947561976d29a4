//! # facture-core: Pure Business Logic for Facture
//!
//! This crate holds the invoicing rules as pure functions with zero I/O
//! dependencies: money, domain types, validation, the tax rate policy, the
//! totals formula and the EBMS payload mapping.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Facture Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/facture-cli                             │   │
//! │  │    client add, invoice create, item add, sync, cancel ...      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌───────────────────────┐  ┌──▼──────────────────────────────────┐   │
//! │  │ facture-ebms          │  │ facture-db                          │   │
//! │  │ EbmsClient, SyncOrch. │─►│ Repositories, TotalsEngine (tx)     │   │
//! │  └───────────┬───────────┘  └──┬──────────────────────────────────┘   │
//! │              │                 │                                        │
//! │  ┌───────────▼─────────────────▼───────────────────────────────────┐   │
//! │  │               ★ facture-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │   │  types  │ │  money  │ │tax_policy │ │ totals │ │  ebms  │ │   │
//! │  │   │ Invoice │ │  Money  │ │ 0% / 18%  │ │ Σ, tax │ │payload │ │   │
//! │  │   └─────────┘ └─────────┘ └───────────┘ └────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Client, Invoice, InvoiceItem, TaxRegistration)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types and the shared [`ErrorKind`]
//! - [`validation`] - Business rule validation
//! - [`tax_policy`] - Client VAT flag → tax rate
//! - [`totals`] - Subtotal / tax / total formula
//! - [`ebms`] - Tax authority submission payload
//!
//! ## Example Usage
//!
//! ```rust
//! use facture_core::money::Money;
//! use facture_core::tax_policy::STANDARD_VAT_RATE;
//! use facture_core::totals::InvoiceTotals;
//!
//! let totals = InvoiceTotals::from_subtotal(Money::from_cents(20000), STANDARD_VAT_RATE).unwrap();
//! assert_eq!(totals.tax.to_string(), "36.00");
//! assert_eq!(totals.total.to_string(), "236.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod ebms;
pub mod error;
pub mod money;
pub mod tax_policy;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use totals::InvoiceTotals;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single invoice line.
///
/// ## Business Reason
/// Catches typing slips (1000 instead of 10) before they reach the tax
/// authority, where a registered invoice can only be canceled, not edited.
pub const MAX_ITEM_QUANTITY: i64 = 1_000_000;

/// Maximum unit price of a single invoice line, in cents (10 billion).
///
/// Together with [`MAX_ITEM_QUANTITY`] this keeps a line total below 10^18
/// cents, so a handful of maximal lines plus their tax still fit in `i64`.
/// Totals past that point are rejected instead of wrapping.
pub const MAX_UNIT_PRICE_CENTS: i64 = 1_000_000_000_000;
