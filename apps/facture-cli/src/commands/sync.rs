//! `facture sync | cancel | remote | registrations`
//!
//! ## Sync From the Command Line
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  facture sync 42                                                        │
//! │     │                                                                   │
//! │     ├── EbmsConfig::load(--config)   file + FACTURE_* env              │
//! │     ├── SyncOrchestrator::new        rejects incomplete settings       │
//! │     └── sync_invoice(42)             stages logged on stderr           │
//! │                                                                         │
//! │  stdout: SyncReceipt                                                    │
//! │  PARTIAL_SYNC_ERROR: do not re-submit; rerun `facture sync 42` to      │
//! │                      finish the local update                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;

use facture_db::Database;
use facture_ebms::{EbmsConfig, SyncError, SyncObserver, SyncOrchestrator, SyncStage};
use tracing::{info, warn};

use super::{to_json, CommandResult};
use crate::error::ApiError;

/// Writes every stage transition to the log.
struct LogObserver;

impl SyncObserver for LogObserver {
    fn on_stage(&self, invoice_id: i64, stage: SyncStage) {
        info!(invoice_id, stage = %stage, "Sync stage");
    }

    fn on_failure(&self, invoice_id: i64, stage: SyncStage, error: &SyncError) {
        if error.upstream_committed() {
            warn!(
                invoice_id,
                stage = %stage,
                "EBMS holds this invoice; do not submit it again"
            );
        }
    }
}

fn orchestrator(db: &Database, config_path: Option<&Path>) -> Result<SyncOrchestrator, ApiError> {
    let config = EbmsConfig::load(config_path)?;
    let orchestrator = SyncOrchestrator::new(&config, db.clone())?;
    Ok(orchestrator.with_observer(Arc::new(LogObserver)))
}

pub async fn sync(db: &Database, config_path: Option<&Path>, invoice_id: i64) -> CommandResult {
    let receipt = orchestrator(db, config_path)?
        .sync_invoice(invoice_id, None)
        .await?;
    to_json(&receipt)
}

pub async fn cancel(
    db: &Database,
    config_path: Option<&Path>,
    invoice_id: i64,
    reason: &str,
) -> CommandResult {
    let registration = orchestrator(db, config_path)?
        .cancel_invoice(invoice_id, reason)
        .await?;
    to_json(&registration)
}

pub async fn remote(db: &Database, config_path: Option<&Path>, invoice_id: i64) -> CommandResult {
    let invoice = orchestrator(db, config_path)?
        .fetch_remote_invoice(invoice_id)
        .await?;
    to_json(&invoice)
}

pub async fn registrations(db: &Database) -> CommandResult {
    to_json(&db.tax_registrations().list().await?)
}
