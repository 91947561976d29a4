//! # Tax Registration Repository
//!
//! One row per invoice accepted by the tax authority.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  addInvoice_confirm OK ──► create()        status = active             │
//! │                                 │                                       │
//! │  cancelInvoice OK ──────► mark_canceled()  status = canceled           │
//! │                                            cancellation_reason = motif │
//! │                                                                         │
//! │  UNIQUE(invoice_id): a second create() for the same invoice is a       │
//! │  UniqueViolation, never a second row.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::{fetch_registration, REGISTRATION_COLUMNS};
use facture_core::{NewTaxRegistration, RegistrationStatus, TaxRegistration};

/// Repository for tax registration operations.
#[derive(Debug, Clone)]
pub struct TaxRegistrationRepository {
    pool: SqlitePool,
}

impl TaxRegistrationRepository {
    /// Creates a new TaxRegistrationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TaxRegistrationRepository { pool }
    }

    /// Records an authority registration for an invoice.
    ///
    /// ## Errors
    /// - `UniqueViolation` if the invoice already has a registration
    /// - `ForeignKeyViolation` if the invoice doesn't exist
    pub async fn create(&self, registration: &NewTaxRegistration) -> DbResult<TaxRegistration> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO tax_registrations (
                invoice_id, invoice_identifier, registered_date, authority_reference,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING {REGISTRATION_COLUMNS}"
        );

        let created = sqlx::query_as::<_, TaxRegistration>(&sql)
            .bind(registration.invoice_id)
            .bind(&registration.invoice_identifier)
            .bind(&registration.registered_date)
            .bind(registration.authority_reference.as_deref())
            .bind(RegistrationStatus::Active)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => {
                    DbError::duplicate(field, registration.invoice_id.to_string())
                }
                other => other,
            })?;

        info!(
            invoice_id = created.invoice_id,
            identifier = %created.invoice_identifier,
            registered_date = %created.registered_date,
            "Tax registration recorded"
        );
        Ok(created)
    }

    pub async fn get_by_invoice(&self, invoice_id: i64) -> DbResult<Option<TaxRegistration>> {
        fetch_registration(&self.pool, invoice_id).await
    }

    /// All registrations, newest first.
    pub async fn list(&self) -> DbResult<Vec<TaxRegistration>> {
        let sql = format!("SELECT {REGISTRATION_COLUMNS} FROM tax_registrations ORDER BY id DESC");
        let registrations = sqlx::query_as::<_, TaxRegistration>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(registrations)
    }

    /// Flags the registration as canceled at the authority.
    pub async fn mark_canceled(&self, invoice_id: i64, reason: &str) -> DbResult<TaxRegistration> {
        let sql = format!(
            "UPDATE tax_registrations
             SET status = ?1, cancellation_reason = ?2, updated_at = ?3
             WHERE invoice_id = ?4
             RETURNING {REGISTRATION_COLUMNS}"
        );

        let registration = sqlx::query_as::<_, TaxRegistration>(&sql)
            .bind(RegistrationStatus::Canceled)
            .bind(reason)
            .bind(Utc::now())
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("TaxRegistration", invoice_id))?;

        info!(invoice_id, "Tax registration canceled");
        Ok(registration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use facture_core::ErrorKind;

    fn registration(invoice_id: i64) -> NewTaxRegistration {
        NewTaxRegistration {
            invoice_id,
            invoice_identifier: format!("4000003568/demo/20240305101530/{invoice_id:05}"),
            registered_date: "2024-03-05 10:15:31".to_string(),
            authority_reference: Some("REG-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_get_and_cancel() {
        let db = fixtures::database().await;
        let client = fixtures::client(&db, true).await;
        let invoice = fixtures::invoice(&db, &client, "00001/2024").await;

        let created = db
            .tax_registrations()
            .create(&registration(invoice.id))
            .await
            .unwrap();
        assert_eq!(created.status, RegistrationStatus::Active);
        assert!(!created.is_canceled());

        let fetched = db
            .tax_registrations()
            .get_by_invoice(invoice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, created);

        let canceled = db
            .tax_registrations()
            .mark_canceled(invoice.id, "Erreur de saisie")
            .await
            .unwrap();
        assert!(canceled.is_canceled());
        assert_eq!(canceled.cancellation_reason.as_deref(), Some("Erreur de saisie"));
        assert_eq!(db.tax_registrations().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_registration_per_invoice() {
        let db = fixtures::database().await;
        let client = fixtures::client(&db, true).await;
        let invoice = fixtures::invoice(&db, &client, "00001/2024").await;

        db.tax_registrations()
            .create(&registration(invoice.id))
            .await
            .unwrap();
        let err = db
            .tax_registrations()
            .create(&registration(invoice.id))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(db.tax_registrations().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_registration_requires_invoice() {
        let db = fixtures::database().await;

        let err = db
            .tax_registrations()
            .create(&registration(77))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        let err = db
            .tax_registrations()
            .mark_canceled(77, "n/a")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
