//! # Error Types
//!
//! Domain-specific error types for facture-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  facture-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Caller-facing classification                   │
//! │                                                                         │
//! │  facture-db errors                                                     │
//! │  └── DbError          - Ledger store failures                          │
//! │                                                                         │
//! │  facture-ebms errors                                                   │
//! │  ├── EbmsError        - Tax authority transport/protocol failures      │
//! │  └── SyncError        - Orchestrator failures (per step)               │
//! │                                                                         │
//! │  Every error answers `kind()` so callers get one discriminated         │
//! │  result: { kind: "NOT_FOUND", message: "Invoice not found: 7" }         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Caller-facing classification shared by every crate in the workspace.
///
/// ## Mapping
/// ```text
/// ValidationError / CoreError::*         → Validation
/// missing invoice / client / item        → NotFound
/// /login/ failed                         → ExternalAuth
/// /addInvoice_confirm/ rejected/unreach. → ExternalSubmit
/// authority committed, local write lost  → PartialSync
/// SQLite failure                         → Persistence
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "EXTERNAL_AUTH_ERROR")]
    ExternalAuth,
    #[serde(rename = "EXTERNAL_SUBMIT_ERROR")]
    ExternalSubmit,
    #[serde(rename = "PARTIAL_SYNC_ERROR")]
    PartialSync,
    #[serde(rename = "PERSISTENCE_ERROR")]
    Persistence,
}

impl ErrorKind {
    /// The wire code, identical to the serde representation.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::ExternalAuth => "EXTERNAL_AUTH_ERROR",
            ErrorKind::ExternalSubmit => "EXTERNAL_SUBMIT_ERROR",
            ErrorKind::PartialSync => "PARTIAL_SYNC_ERROR",
            ErrorKind::Persistence => "PERSISTENCE_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The invoice is registered with the tax authority and is frozen.
    ///
    /// ## When This Occurs
    /// - Adding or removing items after a successful sync
    /// - Syncing the same invoice twice
    /// - Deleting a registered invoice
    #[error("Invoice {invoice_id} is already registered with the tax authority")]
    InvoiceSynced { invoice_id: i64 },

    /// The client handed to a pure operation is not the invoice's client.
    #[error("Client {client_id} does not own invoice {invoice_id}")]
    ClientMismatch { invoice_id: i64, client_id: i64 },

    /// An item handed to a pure operation belongs to another invoice.
    #[error("Item {item_id} does not belong to invoice {invoice_id}")]
    ForeignItem { invoice_id: i64, item_id: i64 },

    /// Submitting an invoice without items.
    #[error("Invoice {invoice_id} has no items")]
    EmptyInvoice { invoice_id: i64 },

    /// The invoice has no registration to act on (cancel, read-back).
    #[error("Invoice {invoice_id} has not been registered with the tax authority")]
    NotRegistered { invoice_id: i64 },

    /// The registration was already canceled.
    #[error("Registration for invoice {invoice_id} is already canceled")]
    AlreadyCanceled { invoice_id: i64 },

    /// Deleting a client that still has invoices.
    #[error("Client {client_id} still has {invoices} invoice(s)")]
    ClientHasInvoices { client_id: i64, invoices: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Every core error is a rejected precondition.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any mutation so a rejected request leaves no trace.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invoice number, email, amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvoiceSynced { invoice_id: 7 };
        assert_eq!(
            err.to_string(),
            "Invoice 7 is already registered with the tax authority"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "description".to_string(),
        };
        assert_eq!(err.to_string(), "description is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "email".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_kind_wire_codes() {
        let json = serde_json::to_string(&ErrorKind::PartialSync).unwrap();
        assert_eq!(json, "\"PARTIAL_SYNC_ERROR\"");
        assert_eq!(ErrorKind::ExternalAuth.to_string(), "EXTERNAL_AUTH_ERROR");

        let parsed: ErrorKind = serde_json::from_str("\"NOT_FOUND\"").unwrap();
        assert_eq!(parsed, ErrorKind::NotFound);
    }
}
