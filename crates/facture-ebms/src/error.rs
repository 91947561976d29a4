//! # EBMS & Sync Error Types
//!
//! Error types for tax authority calls and the sync orchestrator.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  EbmsError (one HTTP call)           SyncError (one sync / cancel)      │
//! │  ─────────────────────────           ──────────────────────────────     │
//! │  Transport   unreachable             Auth(EbmsError)     → AUTH         │
//! │  Timeout     no answer in time       Submit(EbmsError)   → SUBMIT       │
//! │  Http        non-2xx status          Cancel(EbmsError)   → SUBMIT       │
//! │  Rejected    success: false          ReadBack(EbmsError) → SUBMIT       │
//! │  InvalidResponse  bad JSON shape     PartialSync         → PARTIAL_SYNC │
//! │  Unacknowledged   accepted, no result                                   │
//! │                                      PartialCancel       → PARTIAL_SYNC │
//! │                                      Database(DbError)   → its kind     │
//! │                                      Domain(CoreError)   → VALIDATION   │
//! │                                      InvalidConfig       → VALIDATION   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same transport failure means different things depending on the
//! step: a timeout at login is an auth error, at submission a submit error.
//! That is why `EbmsError` never reaches callers unwrapped.

use facture_core::{CoreError, ErrorKind};
use facture_db::DbError;
use thiserror::Error;

use crate::orchestrator::SyncStage;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// EBMS Call Errors
// =============================================================================

/// Failure of a single call to the tax authority API.
#[derive(Debug, Error)]
pub enum EbmsError {
    /// Connection refused, DNS failure, TLS failure.
    #[error("EBMS unreachable: {0}")]
    Transport(String),

    /// No complete response within the configured timeout.
    #[error("EBMS request timed out")]
    Timeout,

    /// Non-success HTTP status.
    #[error("EBMS returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// HTTP 2xx but `success: false` in the body.
    #[error("EBMS rejected the request: {0}")]
    Rejected(String),

    /// The body didn't have the expected shape.
    #[error("Unexpected EBMS response: {0}")]
    InvalidResponse(String),

    /// HTTP 2xx and not rejected, but no usable registration came back.
    /// The authority may hold the invoice already.
    #[error("EBMS accepted the invoice but returned no registration ({0})")]
    Unacknowledged(String),
}

impl From<reqwest::Error> for EbmsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EbmsError::Timeout
        } else if err.is_decode() {
            EbmsError::InvalidResponse(err.to_string())
        } else {
            EbmsError::Transport(err.to_string())
        }
    }
}

// =============================================================================
// Sync Errors
// =============================================================================

/// Sync, cancel and read-back failures, classified for the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid EBMS configuration.
    #[error("Invalid EBMS configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Local Errors (nothing sent upstream)
    // =========================================================================
    /// A business rule refused the operation (already synced, no items...).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Ledger store failure or missing row.
    #[error(transparent)]
    Database(#[from] DbError),

    // =========================================================================
    // Upstream Errors (nothing committed upstream)
    // =========================================================================
    /// Login failed.
    #[error("EBMS authentication failed: {0}")]
    Auth(#[source] EbmsError),

    /// The invoice submission failed or was rejected.
    #[error("EBMS invoice submission failed: {0}")]
    Submit(#[source] EbmsError),

    /// The cancellation call failed or was rejected.
    #[error("EBMS cancellation failed: {0}")]
    Cancel(#[source] EbmsError),

    /// The read-back of a registered invoice failed.
    #[error("EBMS invoice lookup failed: {0}")]
    ReadBack(#[source] EbmsError),

    // =========================================================================
    // Partial Errors (committed upstream, not locally)
    // =========================================================================
    /// EBMS registered the invoice but the local record is incomplete.
    ///
    /// ## Reconciliation
    /// The invoice must NOT be submitted again: the authority already holds
    /// `identifier`. Re-running sync resumes from the stage that failed.
    #[error(
        "Invoice {invoice_id} was registered by EBMS ({identifier}, registered {registered_date}) \
         but the local update failed while {stage}: {reason}"
    )]
    PartialSync {
        invoice_id: i64,
        identifier: String,
        registered_date: String,
        stage: SyncStage,
        reason: String,
    },

    /// EBMS canceled the invoice but the local registration still reads active.
    #[error("Invoice {invoice_id} was canceled by EBMS but the local registration was not updated: {reason}")]
    PartialCancel { invoice_id: i64, reason: String },
}

impl SyncError {
    /// Classifies the error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidConfig(_) | SyncError::ConfigLoadFailed(_) => ErrorKind::Validation,
            SyncError::Domain(err) => err.kind(),
            SyncError::Database(err) => err.kind(),
            SyncError::Auth(_) => ErrorKind::ExternalAuth,
            SyncError::Submit(_) | SyncError::Cancel(_) | SyncError::ReadBack(_) => {
                ErrorKind::ExternalSubmit
            }
            SyncError::PartialSync { .. } | SyncError::PartialCancel { .. } => {
                ErrorKind::PartialSync
            }
        }
    }

    /// True when the tax authority already committed the operation.
    pub fn upstream_committed(&self) -> bool {
        matches!(
            self,
            SyncError::PartialSync { .. } | SyncError::PartialCancel { .. }
        )
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}
