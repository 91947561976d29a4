//! # Client Repository
//!
//! Database operations for clients.
//!
//! The client's `vat_taxpayer` flag is the single input of the tax rate
//! policy: every totals recompute and every EBMS payload reads it from here.
//! Flipping the flag does not touch existing invoices; their totals follow
//! on the next item change or an explicit recompute.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{fetch_client, CLIENT_COLUMNS};
use facture_core::validation::validate_new_client;
use facture_core::{Client, ClientStatus, CoreError, NewClient};

/// Repository for client database operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    /// Creates a new ClientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Creates a client after validating its fields.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for a bad name, email, phone or company
    /// - `UniqueViolation` for a duplicate email or tax id
    pub async fn create(&self, client: &NewClient) -> DbResult<Client> {
        validate_new_client(client)?;

        let now = Utc::now();
        debug!(email = %client.email, "Creating client");

        let sql = format!(
            "INSERT INTO clients (
                name, email, phone, company, tax_id, address,
                status, vat_taxpayer, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            RETURNING {CLIENT_COLUMNS}"
        );

        let created = sqlx::query_as::<_, Client>(&sql)
            .bind(client.name.trim())
            .bind(client.email.trim())
            .bind(client.phone.trim())
            .bind(client.company.trim())
            .bind(client.tax_id.as_deref().map(str::trim))
            .bind(client.address.as_deref())
            .bind(ClientStatus::Active)
            .bind(client.vat_taxpayer)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| duplicate_field(e, client))?;

        info!(
            client_id = created.id,
            vat_taxpayer = created.vat_taxpayer,
            "Client created"
        );
        Ok(created)
    }

    /// Gets a client by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Client>> {
        fetch_client(&self.pool, id).await
    }

    /// Lists clients by name, optionally restricted to one status.
    pub async fn list(&self, status: Option<ClientStatus>) -> DbResult<Vec<Client>> {
        let clients = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {CLIENT_COLUMNS} FROM clients WHERE status = ?1 ORDER BY name, id"
                );
                sqlx::query_as::<_, Client>(&sql)
                    .bind(status)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients ORDER BY name, id");
                sqlx::query_as::<_, Client>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(clients)
    }

    /// Replaces a client's editable fields. Status and creation time stay.
    ///
    /// Existing invoices keep their stored totals until the next item change
    /// or recompute, even when `vat_taxpayer` flips.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for a bad name, email, phone or company
    /// - `UniqueViolation` for an email or tax id owned by another client
    /// - `NotFound` for a missing client
    pub async fn update(&self, id: i64, client: &NewClient) -> DbResult<Client> {
        validate_new_client(client)?;

        let sql = format!(
            "UPDATE clients SET
                name = ?1, email = ?2, phone = ?3, company = ?4, tax_id = ?5,
                address = ?6, vat_taxpayer = ?7, updated_at = ?8
             WHERE id = ?9
             RETURNING {CLIENT_COLUMNS}"
        );

        let updated = sqlx::query_as::<_, Client>(&sql)
            .bind(client.name.trim())
            .bind(client.email.trim())
            .bind(client.phone.trim())
            .bind(client.company.trim())
            .bind(client.tax_id.as_deref().map(str::trim))
            .bind(client.address.as_deref())
            .bind(client.vat_taxpayer)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| duplicate_field(e, client))?
            .ok_or_else(|| DbError::not_found("Client", id))?;

        info!(
            client_id = id,
            vat_taxpayer = updated.vat_taxpayer,
            "Client updated"
        );
        Ok(updated)
    }

    /// Deletes a client without invoices.
    ///
    /// ## Errors
    /// - `NotFound` for a missing client
    /// - `Domain(ClientHasInvoices)` while any invoice references the client
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        fetch_client(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Client", id))?;

        let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE client_id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if invoices > 0 {
            return Err(CoreError::ClientHasInvoices {
                client_id: id,
                invoices,
            }
            .into());
        }

        sqlx::query("DELETE FROM clients WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(client_id = id, "Client deleted");
        Ok(())
    }

    /// Activates or deactivates a client.
    pub async fn set_status(&self, id: i64, status: ClientStatus) -> DbResult<Client> {
        let sql = format!(
            "UPDATE clients SET status = ?1, updated_at = ?2 WHERE id = ?3
             RETURNING {CLIENT_COLUMNS}"
        );

        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Client", id))?;

        info!(client_id = id, status = ?status, "Client status updated");
        Ok(client)
    }
}

/// Names the offending value of a unique email or tax id violation.
fn duplicate_field(err: sqlx::Error, client: &NewClient) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } if field.ends_with("email") => {
            DbError::duplicate(field, client.email.trim())
        }
        DbError::UniqueViolation { field, .. } if field.ends_with("tax_id") => {
            DbError::duplicate(field, client.tax_id.clone().unwrap_or_default())
        }
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
