//! # Sync Orchestrator
//!
//! Drives one invoice through registration with the tax authority and
//! records the result in the ledger.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Invoice Sync Stages                              │
//! │                                                                         │
//! │  Unsynced ── pre-check: invoice exists & unsynced, client, items       │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Authenticating ── POST /login/ ─────────────── fail → Auth            │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Submitting ── to_ebms_invoice() + POST /addInvoice_confirm/           │
//! │     │                                         fail → Submit            │
//! │     │                       accepted, no result → PartialSync          │
//! │     │  ─ ─ ─ ─ ─ ─ ─ authority has committed from here ─ ─ ─ ─ ─ ─    │
//! │     ▼                                                                   │
//! │  RecordingTax ── INSERT tax_registrations ───── fail → PartialSync     │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  UpdatingLocalState ── invoices.sync = 1 ────── fail → PartialSync     │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Synced                                                                 │
//! │                                                                         │
//! │  Failed: reachable from every non-terminal stage                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## No Transaction Across the Network Call
//! The submission can't be rolled back, so the steps after it are plain
//! writes. If one of them fails the caller gets [`SyncError::PartialSync`]
//! with the identifier and registration date needed to reconcile.
//!
//! ## Resuming
//! An invoice with a registration row but `sync = false` stopped between
//! RecordingTax and Synced. Syncing it again skips the authority entirely
//! and only finishes the local update: submitting twice would register the
//! invoice twice upstream.
//!
//! An accepted submission that comes back without a registration result
//! leaves nothing to record locally. It is reported as `PartialSync` at the
//! Submitting stage so the operator checks the authority before retrying.

use std::sync::Arc;

use facture_core::ebms::{invoice_identifier, to_ebms_invoice, TaxpayerProfile};
use facture_core::validation::validate_cancel_reason;
use facture_core::{CoreError, InvoiceItem, NewTaxRegistration, TaxRegistration};
use facture_db::{Database, DbError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::EbmsClient;
use crate::config::EbmsConfig;
use crate::error::{EbmsError, SyncError, SyncResult};
use crate::protocol::RemoteInvoice;

/// Registration date reported when the authority accepted an invoice
/// without saying when.
pub const UNKNOWN_REGISTRATION_DATE: &str = "unknown";

// =============================================================================
// Sync Stage
// =============================================================================

/// Where an invoice is in the sync flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Unsynced,
    Authenticating,
    Submitting,
    RecordingTax,
    UpdatingLocalState,
    Synced,
    Failed,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStage::Unsynced => write!(f, "unsynced"),
            SyncStage::Authenticating => write!(f, "authenticating"),
            SyncStage::Submitting => write!(f, "submitting"),
            SyncStage::RecordingTax => write!(f, "recording tax"),
            SyncStage::UpdatingLocalState => write!(f, "updating local state"),
            SyncStage::Synced => write!(f, "synced"),
            SyncStage::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Observer Trait
// =============================================================================

/// Receives stage transitions (progress display, audit trail).
pub trait SyncObserver: Send + Sync {
    /// Called on entering each stage, `Synced` and `Failed` included.
    fn on_stage(&self, invoice_id: i64, stage: SyncStage);

    /// Called once before `Failed`, with the stage that failed.
    fn on_failure(&self, _invoice_id: i64, _stage: SyncStage, _error: &SyncError) {}
}

/// No-op observer.
pub struct NoOpObserver;

impl SyncObserver for NoOpObserver {
    fn on_stage(&self, _invoice_id: i64, _stage: SyncStage) {}
}

// =============================================================================
// Receipt
// =============================================================================

/// Outcome of a successful sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReceipt {
    /// Correlates the log lines of this attempt.
    pub attempt_id: Uuid,
    pub invoice_id: i64,
    pub invoice_identifier: String,
    /// `invoice_registered_number` from the authority.
    pub reference: Option<String>,
    pub registered_date: String,
    /// True when an earlier attempt had already registered the invoice and
    /// this one only completed the local update.
    pub resumed: bool,
}

// =============================================================================
// Sync Orchestrator
// =============================================================================

/// Registers invoices with EBMS, cancels them, and reads them back.
pub struct SyncOrchestrator {
    db: Database,
    client: EbmsClient,
    profile: TaxpayerProfile,
    observer: Arc<dyn SyncObserver>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator; the config must be complete enough to sync.
    pub fn new(config: &EbmsConfig, db: Database) -> SyncResult<Self> {
        config.validate_for_sync()?;

        let client =
            EbmsClient::new(&config.api).map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        Ok(SyncOrchestrator {
            db,
            client,
            profile: config.taxpayer.clone(),
            observer: Arc::new(NoOpObserver),
        })
    }

    /// Replaces the observer.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Registers one invoice with the tax authority.
    ///
    /// `items` lets a caller that already holds the invoice's items skip
    /// the reload; they are checked against the invoice by the transform.
    ///
    /// ## Errors
    /// - `Database(NotFound)` for a missing invoice or client
    /// - `Domain` if already synced, without items, or not transformable
    /// - `Auth` / `Submit` if the authority refused or was unreachable
    /// - `PartialSync` if the authority registered it but a local write failed
    pub async fn sync_invoice(
        &self,
        invoice_id: i64,
        items: Option<Vec<InvoiceItem>>,
    ) -> SyncResult<SyncReceipt> {
        let attempt_id = Uuid::new_v4();
        let mut stage = SyncStage::Unsynced;

        info!(%attempt_id, invoice_id, "Starting invoice sync");

        match self.run_sync(attempt_id, invoice_id, items, &mut stage).await {
            Ok(receipt) => {
                self.enter(invoice_id, &mut stage, SyncStage::Synced);
                info!(
                    %attempt_id,
                    invoice_id,
                    identifier = %receipt.invoice_identifier,
                    resumed = receipt.resumed,
                    "Invoice synced"
                );
                Ok(receipt)
            }
            Err(err) => {
                error!(
                    %attempt_id,
                    invoice_id,
                    stage = %stage,
                    kind = %err.kind(),
                    upstream_committed = err.upstream_committed(),
                    error = %err,
                    "Invoice sync failed"
                );
                self.observer.on_failure(invoice_id, stage, &err);
                self.observer.on_stage(invoice_id, SyncStage::Failed);
                Err(err)
            }
        }
    }

    async fn run_sync(
        &self,
        attempt_id: Uuid,
        invoice_id: i64,
        items: Option<Vec<InvoiceItem>>,
        stage: &mut SyncStage,
    ) -> SyncResult<SyncReceipt> {
        // Pre-check
        let invoice = self
            .db
            .invoices()
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;

        if invoice.sync {
            return Err(CoreError::InvoiceSynced { invoice_id }.into());
        }

        let client = self
            .db
            .clients()
            .get_by_id(invoice.client_id)
            .await?
            .ok_or_else(|| DbError::not_found("Client", invoice.client_id))?;

        if let Some(registration) = self.db.tax_registrations().get_by_invoice(invoice_id).await? {
            warn!(
                %attempt_id,
                invoice_id,
                identifier = %registration.invoice_identifier,
                "Invoice already registered upstream, completing local update only"
            );
            return self.finish_local(attempt_id, registration, stage, true).await;
        }

        let items = match items {
            Some(items) => items,
            None => self.db.items().list_by_invoice(invoice_id).await?,
        };
        if items.is_empty() {
            return Err(CoreError::EmptyInvoice { invoice_id }.into());
        }

        // Step 1: authenticate
        self.enter(invoice_id, stage, SyncStage::Authenticating);
        let token = self.client.login().await.map_err(SyncError::Auth)?;
        debug!(%attempt_id, "Authenticated with EBMS");

        // Steps 3-5: transform, submit, extract
        self.enter(invoice_id, stage, SyncStage::Submitting);
        let payload = to_ebms_invoice(
            &invoice,
            &client,
            &items,
            &self.profile,
            self.client.username(),
        )?;
        let registered = self
            .client
            .confirm_invoice(&token, &payload)
            .await
            .map_err(|e| match e {
                EbmsError::Unacknowledged(msg) => SyncError::PartialSync {
                    invoice_id,
                    identifier: payload.invoice_identifier.clone(),
                    registered_date: UNKNOWN_REGISTRATION_DATE.to_string(),
                    stage: SyncStage::Submitting,
                    reason: format!("accepted without a registration result: {msg}"),
                },
                other => SyncError::Submit(other),
            })?;

        info!(
            %attempt_id,
            invoice_id,
            reference = %registered.invoice_registered_number,
            registered_date = %registered.invoice_registered_date,
            "EBMS accepted invoice"
        );

        // Step 6: record tax
        self.enter(invoice_id, stage, SyncStage::RecordingTax);
        let new_registration = NewTaxRegistration {
            invoice_id,
            invoice_identifier: payload.invoice_identifier.clone(),
            registered_date: registered.invoice_registered_date.clone(),
            authority_reference: Some(registered.invoice_registered_number.clone()),
        };
        let registration = self
            .db
            .tax_registrations()
            .create(&new_registration)
            .await
            .map_err(|e| SyncError::PartialSync {
                invoice_id,
                identifier: new_registration.invoice_identifier.clone(),
                registered_date: new_registration.registered_date.clone(),
                stage: SyncStage::RecordingTax,
                reason: e.to_string(),
            })?;

        // Step 7: mark synced
        self.finish_local(attempt_id, registration, stage, false).await
    }

    /// Sets `sync = true` for a recorded registration.
    async fn finish_local(
        &self,
        attempt_id: Uuid,
        registration: TaxRegistration,
        stage: &mut SyncStage,
        resumed: bool,
    ) -> SyncResult<SyncReceipt> {
        let invoice_id = registration.invoice_id;
        self.enter(invoice_id, stage, SyncStage::UpdatingLocalState);

        self.db
            .invoices()
            .mark_synced(invoice_id)
            .await
            .map_err(|e| SyncError::PartialSync {
                invoice_id,
                identifier: registration.invoice_identifier.clone(),
                registered_date: registration.registered_date.clone(),
                stage: SyncStage::UpdatingLocalState,
                reason: e.to_string(),
            })?;

        Ok(SyncReceipt {
            attempt_id,
            invoice_id,
            invoice_identifier: registration.invoice_identifier,
            reference: registration.authority_reference,
            registered_date: registration.registered_date,
            resumed,
        })
    }

    fn enter(&self, invoice_id: i64, current: &mut SyncStage, next: SyncStage) {
        debug!(invoice_id, from = %current, to = %next, "Sync stage");
        *current = next;
        self.observer.on_stage(invoice_id, next);
    }

    /// Cancels a registered invoice upstream, then marks the local
    /// registration canceled with `reason`.
    ///
    /// The external cancellation is not retried or rolled back; if the local
    /// update fails afterwards the error is [`SyncError::PartialCancel`].
    pub async fn cancel_invoice(&self, invoice_id: i64, reason: &str) -> SyncResult<TaxRegistration> {
        validate_cancel_reason(reason).map_err(CoreError::from)?;

        let registration = self.registration_for(invoice_id).await?;
        if registration.is_canceled() {
            return Err(CoreError::AlreadyCanceled { invoice_id }.into());
        }

        info!(invoice_id, identifier = %registration.invoice_identifier, "Canceling invoice with EBMS");

        let token = self.client.login().await.map_err(SyncError::Auth)?;
        self.client
            .cancel_invoice(&token, &registration.invoice_identifier, reason.trim())
            .await
            .map_err(SyncError::Cancel)?;

        let canceled = self
            .db
            .tax_registrations()
            .mark_canceled(invoice_id, reason.trim())
            .await
            .map_err(|e| {
                error!(invoice_id, error = %e, "EBMS canceled the invoice but the local update failed");
                SyncError::PartialCancel {
                    invoice_id,
                    reason: e.to_string(),
                }
            })?;

        info!(invoice_id, "Invoice canceled");
        Ok(canceled)
    }

    /// Reads the authority's copy of a registered invoice.
    pub async fn fetch_remote_invoice(&self, invoice_id: i64) -> SyncResult<RemoteInvoice> {
        let registration = self.registration_for(invoice_id).await?;

        let token = self.client.login().await.map_err(SyncError::Auth)?;
        let remote = self
            .client
            .get_invoice(&token, &registration.invoice_identifier)
            .await
            .map_err(SyncError::ReadBack)?;

        debug!(invoice_id, canceled = remote.is_canceled(), "Fetched remote invoice");
        Ok(remote)
    }

    /// The identifier an invoice would be submitted under, without sending it.
    pub async fn preview_identifier(&self, invoice_id: i64) -> SyncResult<String> {
        let invoice = self
            .db
            .invoices()
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;

        let identifier = invoice_identifier(
            &self.profile.tin,
            self.client.username(),
            invoice.created_at,
            &invoice.invoice_number,
        )
        .map_err(CoreError::from)?;
        Ok(identifier)
    }

    async fn registration_for(&self, invoice_id: i64) -> SyncResult<TaxRegistration> {
        if self.db.invoices().get_by_id(invoice_id).await?.is_none() {
            return Err(DbError::not_found("Invoice", invoice_id).into());
        }

        self.db
            .tax_registrations()
            .get_by_invoice(invoice_id)
            .await?
            .ok_or_else(|| CoreError::NotRegistered { invoice_id }.into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use facture_core::{ErrorKind, Invoice, Money, NewClient, NewInvoice, NewInvoiceItem};
    use facture_db::DbConfig;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const IDENTIFIER: &str = "4000003568/demo/20240305101530/00042";

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<SyncStage>>,
        failed_at: Mutex<Option<SyncStage>>,
    }

    impl SyncObserver for Recorder {
        fn on_stage(&self, _invoice_id: i64, stage: SyncStage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_failure(&self, _invoice_id: i64, stage: SyncStage, _error: &SyncError) {
            *self.failed_at.lock().unwrap() = Some(stage);
        }
    }

    struct Harness {
        server: MockServer,
        db: Database,
        orchestrator: SyncOrchestrator,
        recorder: Arc<Recorder>,
        invoice: Invoice,
    }

    async fn harness() -> Harness {
        let server = MockServer::start().await;
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let client = db
            .clients()
            .create(&NewClient {
                name: "Rusizi Supplies".into(),
                email: "billing@rusizi.bi".into(),
                phone: "+25779000001".into(),
                company: "Rusizi Supplies SA".into(),
                tax_id: Some("4000111222".into()),
                address: Some("Avenue de l'Industrie, Bujumbura".into()),
                vat_taxpayer: true,
            })
            .await
            .unwrap();

        let mut new_invoice = NewInvoice::new("00042/2024", client.id);
        new_invoice.created_at = Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 30).unwrap());
        let invoice = db.invoices().create(&new_invoice).await.unwrap();

        for (description, quantity, cents) in [("Cement 50kg", 2, 5_000), ("Delivery", 1, 10_000)] {
            db.totals()
                .add_item(NewInvoiceItem {
                    invoice_id: invoice.id,
                    description: description.into(),
                    quantity,
                    unit_price: Money::from_cents(cents),
                })
                .await
                .unwrap();
        }

        let mut config = EbmsConfig::default();
        config.api.base_url = server.uri();
        config.api.username = "demo".into();
        config.api.password = "secret".into();
        config.api.timeout_secs = 2;
        config.taxpayer.tin = "4000003568".into();
        config.taxpayer.name = "Kaze Trading SPRL".into();

        let recorder = Arc::new(Recorder::default());
        let orchestrator = SyncOrchestrator::new(&config, db.clone())
            .unwrap()
            .with_observer(recorder.clone());

        Harness {
            server,
            db,
            orchestrator,
            recorder,
            invoice,
        }
    }

    async fn mock_login(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/login/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "result": {"token": "tok-1"}})),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    async fn mock_confirm(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/addInvoice_confirm/"))
            .and(header("authorization", "Bearer tok-1"))
            .and(body_partial_json(json!({
                "invoice_identifier": IDENTIFIER,
                "tp_TIN": "4000003568",
                "customer_TIN": "4000111222",
                "vat_customer_payer": "1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "msg": "Facture ajoutée",
                "result": {
                    "invoice_registered_number": "REG-0042",
                    "invoice_registered_date": "2024-03-05 10:15:31"
                }
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    async fn reload(h: &Harness) -> Invoice {
        h.db.invoices().get_by_id(h.invoice.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_sync_success() {
        let h = harness().await;
        mock_login(&h.server, 1).await;
        mock_confirm(&h.server, 1).await;

        let receipt = h.orchestrator.sync_invoice(h.invoice.id, None).await.unwrap();

        assert_eq!(receipt.invoice_identifier, IDENTIFIER);
        assert_eq!(receipt.reference.as_deref(), Some("REG-0042"));
        assert_eq!(receipt.registered_date, "2024-03-05 10:15:31");
        assert!(!receipt.resumed);

        assert!(reload(&h).await.sync);
        let registration = h
            .db
            .tax_registrations()
            .get_by_invoice(h.invoice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(registration.invoice_identifier, IDENTIFIER);
        assert_eq!(registration.authority_reference.as_deref(), Some("REG-0042"));

        assert_eq!(
            *h.recorder.stages.lock().unwrap(),
            vec![
                SyncStage::Authenticating,
                SyncStage::Submitting,
                SyncStage::RecordingTax,
                SyncStage::UpdatingLocalState,
                SyncStage::Synced,
            ]
        );
    }

    #[tokio::test]
    async fn test_sync_with_preloaded_items() {
        let h = harness().await;
        mock_login(&h.server, 1).await;
        mock_confirm(&h.server, 1).await;

        let items = h.db.items().list_by_invoice(h.invoice.id).await.unwrap();
        let receipt = h
            .orchestrator
            .sync_invoice(h.invoice.id, Some(items))
            .await
            .unwrap();
        assert_eq!(receipt.invoice_identifier, IDENTIFIER);
    }

    #[tokio::test]
    async fn test_login_failure_leaves_invoice_unsynced() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/login/"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
            )
            .mount(&h.server)
            .await;
        mock_confirm(&h.server, 0).await;

        let err = h
            .orchestrator
            .sync_invoice(h.invoice.id, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExternalAuth);
        assert!(!err.upstream_committed());
        assert!(!reload(&h).await.sync);
        assert!(h
            .db
            .tax_registrations()
            .get_by_invoice(h.invoice.id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(*h.recorder.failed_at.lock().unwrap(), Some(SyncStage::Authenticating));
        assert_eq!(h.recorder.stages.lock().unwrap().last(), Some(&SyncStage::Failed));
    }

    #[tokio::test]
    async fn test_submit_rejection_persists_nothing() {
        let h = harness().await;
        mock_login(&h.server, 1).await;
        Mock::given(method("POST"))
            .and(path("/addInvoice_confirm/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": false, "msg": "TIN client invalide"})),
            )
            .mount(&h.server)
            .await;

        let err = h
            .orchestrator
            .sync_invoice(h.invoice.id, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExternalSubmit);
        assert!(err.to_string().contains("TIN client invalide"));
        assert!(!reload(&h).await.sync);
        assert!(h.db.tax_registrations().list().await.unwrap().is_empty());
        assert_eq!(*h.recorder.failed_at.lock().unwrap(), Some(SyncStage::Submitting));
    }

    #[tokio::test]
    async fn test_recording_failure_is_partial_sync() {
        let h = harness().await;
        mock_login(&h.server, 1).await;
        mock_confirm(&h.server, 1).await;

        sqlx::query(
            "CREATE TRIGGER fail_registration BEFORE INSERT ON tax_registrations
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .execute(h.db.pool())
        .await
        .unwrap();

        let err = h
            .orchestrator
            .sync_invoice(h.invoice.id, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PartialSync);
        assert!(err.upstream_committed());
        match &err {
            SyncError::PartialSync {
                identifier,
                registered_date,
                stage,
                reason,
                ..
            } => {
                assert_eq!(identifier, IDENTIFIER);
                assert_eq!(registered_date, "2024-03-05 10:15:31");
                assert_eq!(*stage, SyncStage::RecordingTax);
                assert!(reason.contains("disk full"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(!reload(&h).await.sync);
        assert_eq!(*h.recorder.failed_at.lock().unwrap(), Some(SyncStage::RecordingTax));
    }

    #[tokio::test]
    async fn test_accepted_without_result_is_partial_sync() {
        let h = harness().await;
        mock_login(&h.server, 1).await;
        Mock::given(method("POST"))
            .and(path("/addInvoice_confirm/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "msg": "Facture ajoutée"})),
            )
            .expect(1)
            .mount(&h.server)
            .await;

        let err = h
            .orchestrator
            .sync_invoice(h.invoice.id, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PartialSync);
        assert!(err.upstream_committed());
        match &err {
            SyncError::PartialSync {
                identifier,
                registered_date,
                stage,
                reason,
                ..
            } => {
                assert_eq!(identifier, IDENTIFIER);
                assert_eq!(registered_date, UNKNOWN_REGISTRATION_DATE);
                assert_eq!(*stage, SyncStage::Submitting);
                assert!(reason.contains("Facture ajoutée"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(!reload(&h).await.sync);
        assert!(h.db.tax_registrations().list().await.unwrap().is_empty());
        assert_eq!(*h.recorder.failed_at.lock().unwrap(), Some(SyncStage::Submitting));
    }

    #[tokio::test]
    async fn test_mark_synced_failure_is_partial_sync() {
        let h = harness().await;
        mock_login(&h.server, 1).await;
        mock_confirm(&h.server, 1).await;

        sqlx::query(
            "CREATE TRIGGER fail_sync_flag BEFORE UPDATE OF sync ON invoices
             BEGIN SELECT RAISE(ABORT, 'database is locked'); END;",
        )
        .execute(h.db.pool())
        .await
        .unwrap();

        let err = h
            .orchestrator
            .sync_invoice(h.invoice.id, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PartialSync);
        assert!(err.upstream_committed());
        match &err {
            SyncError::PartialSync {
                identifier,
                registered_date,
                stage,
                reason,
                ..
            } => {
                assert_eq!(identifier, IDENTIFIER);
                assert_eq!(registered_date, "2024-03-05 10:15:31");
                assert_eq!(*stage, SyncStage::UpdatingLocalState);
                assert!(reason.contains("database is locked"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let registration = h
            .db
            .tax_registrations()
            .get_by_invoice(h.invoice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(registration.invoice_identifier, IDENTIFIER);
        assert!(!reload(&h).await.sync);
        assert_eq!(
            *h.recorder.failed_at.lock().unwrap(),
            Some(SyncStage::UpdatingLocalState)
        );

        // Once the store recovers, a rerun only finishes the local update.
        sqlx::query("DROP TRIGGER fail_sync_flag")
            .execute(h.db.pool())
            .await
            .unwrap();
        let receipt = h.orchestrator.sync_invoice(h.invoice.id, None).await.unwrap();
        assert!(receipt.resumed);
        assert!(reload(&h).await.sync);
    }

    #[tokio::test]
    async fn test_resume_after_registration_recorded() {
        let h = harness().await;
        mock_login(&h.server, 0).await;
        mock_confirm(&h.server, 0).await;

        h.db.tax_registrations()
            .create(&NewTaxRegistration {
                invoice_id: h.invoice.id,
                invoice_identifier: IDENTIFIER.into(),
                registered_date: "2024-03-05 10:15:31".into(),
                authority_reference: Some("REG-0042".into()),
            })
            .await
            .unwrap();

        let receipt = h.orchestrator.sync_invoice(h.invoice.id, None).await.unwrap();

        assert!(receipt.resumed);
        assert_eq!(receipt.reference.as_deref(), Some("REG-0042"));
        assert!(reload(&h).await.sync);
        assert_eq!(
            *h.recorder.stages.lock().unwrap(),
            vec![SyncStage::UpdatingLocalState, SyncStage::Synced]
        );
    }

    #[tokio::test]
    async fn test_precheck_failures_make_no_calls() {
        let h = harness().await;
        mock_login(&h.server, 0).await;

        let err = h.orchestrator.sync_invoice(999, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = h
            .orchestrator
            .sync_invoice(h.invoice.id, Some(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Domain(CoreError::EmptyInvoice { .. })));

        h.db.invoices().mark_synced(h.invoice.id).await.unwrap();
        let err = h
            .orchestrator
            .sync_invoice(h.invoice.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Domain(CoreError::InvoiceSynced { .. })));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_cancel_marks_registration() {
        let h = harness().await;
        mock_login(&h.server, 2).await;
        mock_confirm(&h.server, 1).await;
        Mock::given(method("POST"))
            .and(path("/cancelInvoice/"))
            .and(body_partial_json(json!({
                "invoice_identifier": IDENTIFIER,
                "cn_motif": "Erreur de saisie"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "msg": "OK"})),
            )
            .expect(1)
            .mount(&h.server)
            .await;

        h.orchestrator.sync_invoice(h.invoice.id, None).await.unwrap();
        let canceled = h
            .orchestrator
            .cancel_invoice(h.invoice.id, "Erreur de saisie")
            .await
            .unwrap();

        assert!(canceled.is_canceled());
        assert_eq!(canceled.cancellation_reason.as_deref(), Some("Erreur de saisie"));

        let err = h
            .orchestrator
            .cancel_invoice(h.invoice.id, "again")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Domain(CoreError::AlreadyCanceled { .. })));
    }

    #[tokio::test]
    async fn test_cancel_rejected_keeps_registration_active() {
        let h = harness().await;
        mock_login(&h.server, 1).await;
        Mock::given(method("POST"))
            .and(path("/cancelInvoice/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": false, "msg": "Délai dépassé"})),
            )
            .mount(&h.server)
            .await;

        h.db.tax_registrations()
            .create(&NewTaxRegistration {
                invoice_id: h.invoice.id,
                invoice_identifier: IDENTIFIER.into(),
                registered_date: "2024-03-05 10:15:31".into(),
                authority_reference: None,
            })
            .await
            .unwrap();

        let err = h
            .orchestrator
            .cancel_invoice(h.invoice.id, "Erreur de saisie")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalSubmit);

        let registration = h
            .db
            .tax_registrations()
            .get_by_invoice(h.invoice.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!registration.is_canceled());
    }

    #[tokio::test]
    async fn test_cancel_requires_registration_and_reason() {
        let h = harness().await;
        mock_login(&h.server, 0).await;

        let err = h
            .orchestrator
            .cancel_invoice(h.invoice.id, "Erreur")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Domain(CoreError::NotRegistered { .. })));

        let err = h.orchestrator.cancel_invoice(h.invoice.id, "  ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_fetch_remote_invoice() {
        let h = harness().await;
        mock_login(&h.server, 1).await;
        Mock::given(method("POST"))
            .and(path("/getInvoice/"))
            .and(body_partial_json(json!({"invoice_identifier": IDENTIFIER})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "msg": "",
                "result": {"invoices": [{
                    "invoice_number": "00042/2024",
                    "invoice_identifier": IDENTIFIER,
                    "invoice_items": []
                }]}
            })))
            .mount(&h.server)
            .await;

        h.db.tax_registrations()
            .create(&NewTaxRegistration {
                invoice_id: h.invoice.id,
                invoice_identifier: IDENTIFIER.into(),
                registered_date: "2024-03-05 10:15:31".into(),
                authority_reference: None,
            })
            .await
            .unwrap();

        let remote = h.orchestrator.fetch_remote_invoice(h.invoice.id).await.unwrap();
        assert_eq!(remote.invoice_number, "00042/2024");
        assert!(!remote.is_canceled());
    }

    #[tokio::test]
    async fn test_preview_identifier() {
        let h = harness().await;
        let identifier = h.orchestrator.preview_identifier(h.invoice.id).await.unwrap();
        assert_eq!(identifier, IDENTIFIER);
    }

    #[tokio::test]
    async fn test_incomplete_config_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let result = SyncOrchestrator::new(&EbmsConfig::default(), db);
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }
}
