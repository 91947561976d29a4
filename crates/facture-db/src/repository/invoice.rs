//! # Invoice Repository
//!
//! Database operations for invoice headers.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Invoice Lifecycle                                 │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── create() → Invoice { sync: false, totals: 0 }                  │
//! │                                                                         │
//! │  2. ADD / REMOVE ITEMS  (TotalsEngine, not this repository)            │
//! │     └── totals recomputed in the same transaction                      │
//! │                                                                         │
//! │  3. SYNC  (SyncOrchestrator)                                           │
//! │     └── tax registration row + mark_synced() → { sync: true }          │
//! │         from here on items and deletion are refused                    │
//! │                                                                         │
//! │  status (paid / pending / overdue) is independent of sync and can      │
//! │  change at any time through set_status()                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{SubsecRound, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{fetch_client, fetch_invoice, fetch_registration, INVOICE_COLUMNS};
use facture_core::validation::validate_new_invoice;
use facture_core::{
    CoreError, Invoice, InvoiceFilter, InvoiceSort, InvoiceStatus, LedgerSummary, Money,
    NewInvoice,
};

/// Invoice columns qualified with the `i` alias used by joined listings.
const JOINED_INVOICE_COLUMNS: &str = "i.id, i.invoice_number, i.client_id, i.sync, \
     i.invoice_type, i.payment_type, i.currency, i.fiscal_center, i.total_amount_cents, \
     i.tax_amount_cents, i.status, i.created_at";

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Creates an invoice header with zero totals.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for a malformed invoice number
    /// - `NotFound` if the client doesn't exist
    /// - `UniqueViolation` if the invoice number is taken
    pub async fn create(&self, invoice: &NewInvoice) -> DbResult<Invoice> {
        validate_new_invoice(invoice)?;

        if fetch_client(&self.pool, invoice.client_id).await?.is_none() {
            return Err(DbError::not_found("Client", invoice.client_id));
        }

        // The identifier sent to the authority carries second precision only
        let created_at = invoice
            .created_at
            .unwrap_or_else(Utc::now)
            .trunc_subsecs(0);

        debug!(invoice_number = %invoice.invoice_number, "Creating invoice");

        let sql = format!(
            "INSERT INTO invoices (
                invoice_number, client_id, sync, invoice_type, payment_type,
                currency, fiscal_center, total_amount_cents, tax_amount_cents,
                status, created_at
            ) VALUES (?1, ?2, 0, ?3, ?4, ?5, ?6, 0, 0, ?7, ?8)
            RETURNING {INVOICE_COLUMNS}"
        );

        let created = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice.invoice_number.trim())
            .bind(invoice.client_id)
            .bind(invoice.invoice_type)
            .bind(invoice.payment_type)
            .bind(invoice.currency)
            .bind(invoice.fiscal_center)
            .bind(invoice.status)
            .bind(created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => {
                    DbError::duplicate(field, invoice.invoice_number.trim())
                }
                other => other,
            })?;

        info!(
            invoice_id = created.id,
            invoice_number = %created.invoice_number,
            client_id = created.client_id,
            "Invoice created"
        );
        Ok(created)
    }

    /// Gets an invoice by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Invoice>> {
        fetch_invoice(&self.pool, id).await
    }

    /// Lists invoices matching a filter.
    ///
    /// ## Filter Semantics
    /// ```text
    /// client_id  → exact match
    /// status     → exact match
    /// synced     → sync flag
    /// search     → case-insensitive substring of invoice number OR client name
    /// sort       → created_at / invoice_number / total, ascending or descending
    /// ```
    pub async fn list(&self, filter: &InvoiceFilter) -> DbResult<Vec<Invoice>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {JOINED_INVOICE_COLUMNS} FROM invoices i \
             JOIN clients c ON c.id = i.client_id WHERE 1 = 1"
        ));

        if let Some(client_id) = filter.client_id {
            query.push(" AND i.client_id = ").push_bind(client_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND i.status = ").push_bind(status);
        }
        if let Some(synced) = filter.synced {
            query.push(" AND i.sync = ").push_bind(synced);
        }
        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let pattern = format!("%{}%", search.to_lowercase());
            query
                .push(" AND (LOWER(i.invoice_number) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(c.name) LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        query.push(match filter.sort {
            InvoiceSort::DateDesc => " ORDER BY i.created_at DESC, i.id DESC",
            InvoiceSort::DateAsc => " ORDER BY i.created_at ASC, i.id ASC",
            InvoiceSort::NumberAsc => " ORDER BY i.invoice_number ASC",
            InvoiceSort::NumberDesc => " ORDER BY i.invoice_number DESC",
            InvoiceSort::AmountAsc => " ORDER BY i.total_amount_cents ASC, i.id ASC",
            InvoiceSort::AmountDesc => " ORDER BY i.total_amount_cents DESC, i.id DESC",
        });

        let invoices = query
            .build_query_as::<Invoice>()
            .fetch_all(&self.pool)
            .await?;

        debug!(count = invoices.len(), "Listed invoices");
        Ok(invoices)
    }

    /// Changes the payment status (paid / pending / overdue).
    pub async fn set_status(&self, id: i64, status: InvoiceStatus) -> DbResult<Invoice> {
        let sql = format!("UPDATE invoices SET status = ?1 WHERE id = ?2 RETURNING {INVOICE_COLUMNS}");

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(status)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))?;

        info!(invoice_id = id, status = ?status, "Invoice status updated");
        Ok(invoice)
    }

    /// Sets `sync = true`. Called by the orchestrator once the registration
    /// row exists.
    pub async fn mark_synced(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE invoices SET sync = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        info!(invoice_id = id, "Invoice marked as synced");
        Ok(())
    }

    /// Deletes an invoice together with its items.
    ///
    /// Refused once the invoice is synced or has a registration row: the
    /// authority knows about it and only cancellation applies.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let invoice = fetch_invoice(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))?;

        if invoice.sync || fetch_registration(&mut *tx, id).await?.is_some() {
            warn!(invoice_id = id, "Refusing to delete a registered invoice");
            return Err(CoreError::InvoiceSynced { invoice_id: id }.into());
        }

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(invoice_id = id, invoice_number = %invoice.invoice_number, "Invoice deleted");
        Ok(())
    }

    /// Dashboard figures over all invoices and clients.
    pub async fn summary(&self) -> DbResult<LedgerSummary> {
        let (revenue, tax, count, paid, pending, overdue, synced): (i64, i64, i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(total_amount_cents), 0),
                    COALESCE(SUM(tax_amount_cents), 0),
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'paid' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'overdue' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(sync), 0)
                FROM invoices
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let active_clients: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM clients WHERE status = 'active'")
                .fetch_one(&self.pool)
                .await?;

        Ok(LedgerSummary {
            total_revenue: Money::from_cents(revenue),
            total_tax: Money::from_cents(tax),
            invoice_count: count,
            paid,
            pending,
            overdue,
            synced,
            unsynced: count - synced,
            active_clients,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
