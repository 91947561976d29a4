//! # Repository Module
//!
//! Database repository implementations for the Facture ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  CLI command / SyncOrchestrator                                        │
//! │       │                                                                 │
//! │       │  db.invoices().list(&filter)                                   │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │  ├── create(&self, new_invoice)                                        │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── list(&self, filter)                                               │
//! │  └── mark_synced(&self, id)                                            │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Item writes are NOT here: they go through TotalsEngine so that the    │
//! │  invoice totals are recomputed in the same transaction.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Shared Row Helpers
//!
//! The free functions below take any sqlx executor, so the same query runs
//! on the pool (`&pool`) or inside an open transaction (`&mut *tx`).
//!
//! ## Available Repositories
//!
//! - [`ClientRepository`](client::ClientRepository) - Clients and their VAT flag
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoice headers, listing, summary
//! - [`InvoiceItemRepository`](item::InvoiceItemRepository) - Read access to items
//! - [`TaxRegistrationRepository`](tax::TaxRegistrationRepository) - Authority registrations

pub mod client;
pub mod invoice;
pub mod item;
pub mod tax;

use facture_core::{Client, Invoice, InvoiceItem, TaxRegistration};
use sqlx::{Executor, Sqlite};

use crate::error::DbResult;

// =============================================================================
// Column Lists
// =============================================================================

pub(crate) const CLIENT_COLUMNS: &str = "id, name, email, phone, company, tax_id, address, \
     status, vat_taxpayer, created_at, updated_at";

pub(crate) const INVOICE_COLUMNS: &str = "id, invoice_number, client_id, sync, invoice_type, \
     payment_type, currency, fiscal_center, total_amount_cents, tax_amount_cents, status, \
     created_at";

pub(crate) const ITEM_COLUMNS: &str =
    "id, invoice_id, description, quantity, unit_price_cents, total_cents";

pub(crate) const REGISTRATION_COLUMNS: &str = "id, invoice_id, invoice_identifier, \
     registered_date, authority_reference, status, cancellation_reason, created_at, updated_at";

// =============================================================================
// Executor-Generic Helpers
// =============================================================================

pub(crate) async fn fetch_client<'e, E>(executor: E, id: i64) -> DbResult<Option<Client>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1");
    let client = sqlx::query_as::<_, Client>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(client)
}

pub(crate) async fn fetch_invoice<'e, E>(executor: E, id: i64) -> DbResult<Option<Invoice>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
    let invoice = sqlx::query_as::<_, Invoice>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(invoice)
}

pub(crate) async fn fetch_item<'e, E>(executor: E, id: i64) -> DbResult<Option<InvoiceItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {ITEM_COLUMNS} FROM invoice_items WHERE id = ?1");
    let item = sqlx::query_as::<_, InvoiceItem>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(item)
}

/// Items of one invoice in insertion order.
pub(crate) async fn fetch_items<'e, E>(executor: E, invoice_id: i64) -> DbResult<Vec<InvoiceItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {ITEM_COLUMNS} FROM invoice_items WHERE invoice_id = ?1 ORDER BY id");
    let items = sqlx::query_as::<_, InvoiceItem>(&sql)
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;
    Ok(items)
}

pub(crate) async fn fetch_registration<'e, E>(
    executor: E,
    invoice_id: i64,
) -> DbResult<Option<TaxRegistration>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {REGISTRATION_COLUMNS} FROM tax_registrations WHERE invoice_id = ?1");
    let registration = sqlx::query_as::<_, TaxRegistration>(&sql)
        .bind(invoice_id)
        .fetch_optional(executor)
        .await?;
    Ok(registration)
}

// =============================================================================
// Test Fixtures
// =============================================================================
