//! # facture-ebms: Tax Authority Sync for Facture
//!
//! Registers invoices with the EBMS tax authority, cancels them, and reads
//! them back, keeping the ledger's `sync` flag and tax registrations in step.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         EBMS Sync Layer                                 │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  SyncOrchestrator (orchestrator.rs)              │  │
//! │  │                                                                  │  │
//! │  │  sync_invoice / cancel_invoice / fetch_remote_invoice            │  │
//! │  │  Stage transitions reported to a SyncObserver                    │  │
//! │  └───────────────┬───────────────────────────────┬──────────────────┘  │
//! │                  │                               │                      │
//! │                  ▼                               ▼                      │
//! │  ┌────────────────────────────┐   ┌────────────────────────────────┐   │
//! │  │ EbmsClient (client.rs)     │   │ facture-db Database            │   │
//! │  │                            │   │                                │   │
//! │  │ reqwest, bearer token      │   │ invoices.sync                  │   │
//! │  │ one attempt per call       │   │ tax_registrations              │   │
//! │  └─────────────┬──────────────┘   └────────────────────────────────┘   │
//! │                │                                                        │
//! │                ▼                                                        │
//! │  protocol.rs: login, addInvoice_confirm, cancelInvoice, getInvoice     │
//! │                                                                         │
//! │  config.rs: [api] + [taxpayer] from facture.toml and FACTURE_* env     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use facture_db::{Database, DbConfig};
//! use facture_ebms::{EbmsConfig, SyncOrchestrator};
//!
//! let config = EbmsConfig::load(None)?;
//! let db = Database::new(DbConfig::new("ledger.db")).await?;
//!
//! let orchestrator = SyncOrchestrator::new(&config, db)?;
//! let receipt = orchestrator.sync_invoice(42, None).await?;
//! println!("Registered as {}", receipt.invoice_identifier);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod protocol;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::EbmsClient;
pub use config::{ApiSettings, EbmsConfig};
pub use error::{EbmsError, SyncError, SyncResult};
pub use orchestrator::{NoOpObserver, SyncObserver, SyncOrchestrator, SyncReceipt, SyncStage};
pub use protocol::{Registration, RemoteInvoice, RemoteInvoiceItem};
