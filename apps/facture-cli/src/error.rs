//! # CLI Error Type
//!
//! Unified error type for every command.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Error Flow in the CLI                              │
//! │                                                                         │
//! │  Command handler → Result<Value, ApiError>                              │
//! │         │                                                               │
//! │         ├── DbError    ─── kind() ──┐                                   │
//! │         ├── SyncError  ─── kind() ──┼──► ApiError { kind, message }     │
//! │         └── CoreError  ─── kind() ──┘                                   │
//! │                                                                         │
//! │  main():                                                                │
//! │    Ok(value)   → stdout: pretty JSON, exit 0                            │
//! │    Err(error)  → stdout: {"kind": "...", "message": "..."}, exit 1      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Low-level persistence failures are logged in full and reported with a
//! generic message; everything else keeps its own message since it tells
//! the operator what to fix.

use facture_core::{CoreError, ErrorKind, ValidationError};
use facture_db::DbError;
use facture_ebms::SyncError;
use serde::Serialize;

/// Error printed when a command fails.
///
/// ```json
/// {
///   "kind": "NOT_FOUND",
///   "message": "Invoice not found: 7"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable classification
    pub kind: ErrorKind,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorKind::Validation, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        ApiError::new(ErrorKind::Persistence, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::QueryFailed(ref e) | DbError::Internal(ref e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::persistence("Database operation failed")
            }
            DbError::TransactionFailed(ref e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::persistence("Database transaction failed")
            }
            other => ApiError::new(other.kind(), other.to_string()),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Database(db) => ApiError::from(db),
            other => ApiError::new(other.kind(), other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::new(err.kind(), err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::new(ErrorKind::Persistence, format!("Failed to encode output: {err}"))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}
