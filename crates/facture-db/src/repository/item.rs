//! # Invoice Item Repository
//!
//! Read access to invoice lines. Inserts and deletes live in
//! [`TotalsEngine`](crate::totals::TotalsEngine), which recomputes the
//! invoice totals in the same transaction.

use sqlx::SqlitePool;

use crate::error::DbResult;
use crate::repository::{fetch_item, fetch_items};
use facture_core::InvoiceItem;

/// Repository for invoice item reads.
#[derive(Debug, Clone)]
pub struct InvoiceItemRepository {
    pool: SqlitePool,
}

impl InvoiceItemRepository {
    /// Creates a new InvoiceItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceItemRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<InvoiceItem>> {
        fetch_item(&self.pool, id).await
    }

    /// Items of one invoice in insertion order.
    pub async fn list_by_invoice(&self, invoice_id: i64) -> DbResult<Vec<InvoiceItem>> {
        fetch_items(&self.pool, invoice_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_line_total_is_generated_by_store() {
        let db = fixtures::database().await;
        let client = fixtures::client(&db, true).await;
        let invoice = fixtures::invoice(&db, &client, "00001/2024").await;

        let added = db
            .totals()
            .add_item(fixtures::item(invoice.id, "Paint 5L", 3, 2_550))
            .await
            .unwrap();
        assert_eq!(added.total_cents, 7_650);

        let fetched = db.items().get_by_id(added.id).await.unwrap().unwrap();
        assert_eq!(fetched, added);

        let listed = db.items().list_by_invoice(invoice.id).await.unwrap();
        assert_eq!(listed, vec![added]);
        assert!(db.items().list_by_invoice(999).await.unwrap().is_empty());
    }
}
