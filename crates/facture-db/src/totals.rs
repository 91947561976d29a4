//! # Totals Engine
//!
//! Keeps `invoices.total_amount_cents` / `tax_amount_cents` equal to what the
//! current item set implies, by writing the item change and the recomputed
//! totals in ONE transaction.
//!
//! ## Insert / Delete Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION (one connection)                   │
//! │                                                                         │
//! │  1. validate input (before BEGIN, nothing written on failure)          │
//! │  2. SELECT invoice          → NotFound / InvoiceSynced                 │
//! │  3. SELECT client           → NotFound                                 │
//! │  4. INSERT item   |   DELETE item                                      │
//! │  5. SELECT items of invoice                                            │
//! │  6. rate     = tax_rate_for(client)          0% or 18%                 │
//! │     subtotal = Σ quantity × unit_price                                 │
//! │     tax      = round_half_up(subtotal × rate)                          │
//! │     total    = subtotal + tax                                          │
//! │  7. UPDATE invoices SET total_amount_cents, tax_amount_cents           │
//! │                                                                         │
//! │  COMMIT ← all or nothing; any error drops the transaction (rollback)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Invoices already registered with the authority (`sync = true`) are frozen:
//! their items can be neither added nor removed.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{fetch_client, fetch_invoice, fetch_item, fetch_items, ITEM_COLUMNS};
use facture_core::tax_policy::tax_rate_for;
use facture_core::validation::validate_new_item;
use facture_core::{CoreError, Invoice, InvoiceItem, InvoiceTotals, NewInvoiceItem};

/// Transactional item writes with totals recompute.
#[derive(Debug, Clone)]
pub struct TotalsEngine {
    pool: SqlitePool,
}

impl TotalsEngine {
    pub fn new(pool: SqlitePool) -> Self {
        TotalsEngine { pool }
    }

    /// Inserts an item and recomputes its invoice's totals.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for empty description, quantity < 1, negative price
    /// - `NotFound` for a missing invoice or client
    /// - `Domain(InvoiceSynced)` if the invoice is already registered
    pub async fn add_item(&self, item: NewInvoiceItem) -> DbResult<InvoiceItem> {
        validate_new_item(&item)?;

        let mut tx = self.begin().await?;

        let invoice = load_mutable_invoice(&mut tx, item.invoice_id).await?;

        let sql = format!(
            "INSERT INTO invoice_items (invoice_id, description, quantity, unit_price_cents)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {ITEM_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, InvoiceItem>(&sql)
            .bind(invoice.id)
            .bind(item.description.trim())
            .bind(item.quantity)
            .bind(item.unit_price.cents())
            .fetch_one(&mut *tx)
            .await?;

        let totals = write_totals(&mut tx, &invoice).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            invoice_id = invoice.id,
            item_id = inserted.id,
            subtotal = %totals.subtotal,
            tax = %totals.tax,
            total = %totals.total,
            "Item added, totals recomputed"
        );
        Ok(inserted)
    }

    /// Deletes an item and recomputes its invoice's totals.
    ///
    /// Returns the invoice totals after the deletion.
    pub async fn remove_item(&self, item_id: i64) -> DbResult<InvoiceTotals> {
        let mut tx = self.begin().await?;

        let item = fetch_item(&mut *tx, item_id)
            .await?
            .ok_or_else(|| DbError::not_found("InvoiceItem", item_id))?;

        let invoice = load_mutable_invoice(&mut tx, item.invoice_id).await?;

        sqlx::query("DELETE FROM invoice_items WHERE id = ?1")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        let totals = write_totals(&mut tx, &invoice).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            invoice_id = invoice.id,
            item_id,
            subtotal = %totals.subtotal,
            tax = %totals.tax,
            total = %totals.total,
            "Item removed, totals recomputed"
        );
        Ok(totals)
    }

    /// Re-derives an invoice's totals from its current items.
    ///
    /// Idempotent: running it twice leaves the same values. Allowed on synced
    /// invoices too, where it only rewrites the values already stored.
    pub async fn recompute(&self, invoice_id: i64) -> DbResult<InvoiceTotals> {
        let mut tx = self.begin().await?;

        let invoice = fetch_invoice(&mut *tx, invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;

        let totals = write_totals(&mut tx, &invoice).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(invoice_id, total = %totals.total, "Totals recomputed");
        Ok(totals)
    }

    async fn begin(&self) -> DbResult<sqlx::Transaction<'static, sqlx::Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Loads an invoice that items may still be written to.
async fn load_mutable_invoice(conn: &mut SqliteConnection, invoice_id: i64) -> DbResult<Invoice> {
    let invoice = fetch_invoice(&mut *conn, invoice_id)
        .await?
        .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;

    if invoice.sync {
        return Err(CoreError::InvoiceSynced { invoice_id }.into());
    }
    Ok(invoice)
}

/// Computes totals from the items visible to `conn` and stores them.
async fn write_totals(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<InvoiceTotals> {
    let client = fetch_client(&mut *conn, invoice.client_id)
        .await?
        .ok_or_else(|| DbError::not_found("Client", invoice.client_id))?;

    let items = fetch_items(&mut *conn, invoice.id).await?;
    let totals = InvoiceTotals::compute(&items, tax_rate_for(&client))?;

    debug!(
        invoice_id = invoice.id,
        items = items.len(),
        rate = %totals.rate.percent_code(),
        "Writing invoice totals"
    );

    sqlx::query(
        "UPDATE invoices SET total_amount_cents = ?1, tax_amount_cents = ?2 WHERE id = ?3",
    )
    .bind(totals.total.cents())
    .bind(totals.tax.cents())
    .bind(invoice.id)
    .execute(&mut *conn)
    .await?;

    Ok(totals)
}

// =============================================================================
// Unit Tests
// =============================================================================
