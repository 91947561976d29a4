//! # EBMS HTTP Client
//!
//! Thin typed wrapper over the four tax authority endpoints.
//!
//! ## Call Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  one attempt per call, no retry                                        │
//! │  connect timeout   api.connect_timeout_secs  (default 10s)             │
//! │  request timeout   api.timeout_secs          (default 30s)             │
//! │                                                                         │
//! │  HTTP status        body                     result                    │
//! │  ───────────        ────                     ──────                    │
//! │  2xx                success != false         Ok(parsed)                │
//! │  2xx                success == false         Err(Rejected(msg))        │
//! │  2xx (confirm)      accepted, no result      Err(Unacknowledged(msg))  │
//! │  non-2xx            {message|msg}            Err(Http{status, msg})    │
//! │  (no response)                               Err(Transport / Timeout)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A submission is not idempotent upstream, so a retry after a timeout could
//! register the invoice twice. Failures go back to the operator instead.

use facture_core::ebms::EbmsInvoice;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ApiSettings;
use crate::error::EbmsError;
use crate::protocol::{
    CancelRequest, ConfirmResponse, Envelope, GetInvoiceRequest, LoginRequest, LoginResponse,
    Registration, RemoteInvoice, RemoteInvoiceResponse, CANCEL_INVOICE_PATH, CONFIRM_INVOICE_PATH,
    GET_INVOICE_PATH, LOGIN_PATH,
};

/// Error body shapes seen on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

/// Client for the EBMS API.
///
/// Holds no session: every flow logs in first and passes the token along.
#[derive(Debug, Clone)]
pub struct EbmsClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl EbmsClient {
    /// Builds a client from the `[api]` settings.
    pub fn new(settings: &ApiSettings) -> Result<Self, EbmsError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .connect_timeout(settings.connect_timeout())
            .build()
            .map_err(|e| EbmsError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(EbmsClient {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    /// The submission username (second segment of invoice identifiers).
    pub fn username(&self) -> &str {
        &self.username
    }

    /// `POST /login/` → bearer token.
    pub async fn login(&self) -> Result<String, EbmsError> {
        let request = LoginRequest {
            username: &self.username,
            password: &self.password,
        };

        let response: LoginResponse = self.post(LOGIN_PATH, None, &request).await?;
        check(&response.envelope)?;

        response
            .token()
            .map(str::to_string)
            .ok_or_else(|| EbmsError::InvalidResponse("login response carries no token".into()))
    }

    /// `POST /addInvoice_confirm/` → registration number and date.
    ///
    /// An accepted response without a usable registration result is
    /// [`EbmsError::Unacknowledged`]: the invoice may already be registered.
    pub async fn confirm_invoice(
        &self,
        token: &str,
        invoice: &EbmsInvoice,
    ) -> Result<Registration, EbmsError> {
        let response: ConfirmResponse = self
            .post(CONFIRM_INVOICE_PATH, Some(token), invoice)
            .await?;
        check(&response.envelope)?;

        response.registration().ok_or_else(|| {
            let msg = response
                .envelope
                .msg
                .unwrap_or_else(|| "no message".to_string());
            warn!(msg = %msg, "EBMS accepted the invoice without a registration result");
            EbmsError::Unacknowledged(msg)
        })
    }

    /// `POST /cancelInvoice/`.
    pub async fn cancel_invoice(
        &self,
        token: &str,
        invoice_identifier: &str,
        reason: &str,
    ) -> Result<(), EbmsError> {
        let request = CancelRequest {
            invoice_identifier,
            cn_motif: reason,
        };
        let response: Envelope = self.post(CANCEL_INVOICE_PATH, Some(token), &request).await?;
        check(&response)
    }

    /// `POST /getInvoice/` → the authority's copy of the invoice.
    pub async fn get_invoice(
        &self,
        token: &str,
        invoice_identifier: &str,
    ) -> Result<RemoteInvoice, EbmsError> {
        let request = GetInvoiceRequest { invoice_identifier };
        let response: RemoteInvoiceResponse =
            self.post(GET_INVOICE_PATH, Some(token), &request).await?;
        check(&response.envelope)?;

        response
            .result
            .and_then(|r| r.invoices.into_iter().next())
            .ok_or_else(|| {
                EbmsError::InvalidResponse(format!("no invoice returned for {invoice_identifier}"))
            })
    }

    async fn post<B, R>(&self, path: &str, token: Option<&str>, body: &B) -> Result<R, EbmsError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http.post(&url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(status = %status, path, "EBMS response received");

        let body = response.text().await?;

        if !status.is_success() {
            let error: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
            let message = error
                .message
                .or(error.msg)
                .unwrap_or_else(|| truncate(&body));
            warn!(status = %status, path, message = %message, "EBMS call failed");
            return Err(EbmsError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| EbmsError::InvalidResponse(e.to_string()))
    }
}

fn check(envelope: &Envelope) -> Result<(), EbmsError> {
    match envelope.rejection() {
        Some(msg) => Err(EbmsError::Rejected(msg)),
        None => Ok(()),
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 200;
    if body.is_empty() {
        return "Unknown error".to_string();
    }
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
