//! # EBMS Wire Protocol
//!
//! Request and response bodies of the tax authority API.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      EBMS Endpoints (all POST, JSON)                    │
//! │                                                                         │
//! │  /login/               LoginRequest        → LoginResponse             │
//! │                        {username,password}   {token} | {result:{token}}│
//! │                                                                         │
//! │  /addInvoice_confirm/  EbmsInvoice         → ConfirmResponse           │
//! │   (Bearer token)                             {result:{invoice_         │
//! │                                               registered_number,       │
//! │                                               invoice_registered_date}}│
//! │                                                                         │
//! │  /cancelInvoice/       CancelRequest       → Envelope                  │
//! │   (Bearer token)       {invoice_identifier,  {success, msg}            │
//! │                         cn_motif}                                      │
//! │                                                                         │
//! │  /getInvoice/          GetInvoiceRequest   → RemoteInvoiceResponse     │
//! │   (Bearer token)       {invoice_identifier}  {success, msg,            │
//! │                                               result:{invoices:[..]}}  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every response may carry `success` and `msg`. An absent `success` is
//! treated as true; `success: false` is a rejection whatever the HTTP
//! status was.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LOGIN_PATH: &str = "/login/";
pub const CONFIRM_INVOICE_PATH: &str = "/addInvoice_confirm/";
pub const CANCEL_INVOICE_PATH: &str = "/cancelInvoice/";
pub const GET_INVOICE_PATH: &str = "/getInvoice/";

// =============================================================================
// Common Envelope
// =============================================================================

/// Fields every EBMS response may carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl Envelope {
    /// `msg` when the response says `success: false`.
    pub fn rejection(&self) -> Option<String> {
        match self.success {
            Some(false) => Some(
                self.msg
                    .clone()
                    .unwrap_or_else(|| "no message".to_string()),
            ),
            _ => None,
        }
    }
}

// =============================================================================
// Login
// =============================================================================

#[derive(Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Login response. The token arrives either at the top level or under
/// `result`, depending on the EBMS deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub result: Option<TokenResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResult {
    #[serde(default)]
    pub token: Option<String>,
}

impl LoginResponse {
    /// The bearer token, wherever it was placed.
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .or_else(|| self.result.as_ref().and_then(|r| r.token.as_deref()))
            .filter(|t| !t.is_empty())
    }
}

// =============================================================================
// Invoice Confirmation
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    /// Kept raw: a malformed result on an accepted submission must not be
    /// confused with a failed one.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl ConfirmResponse {
    /// The registration, if the result has the expected shape.
    pub fn registration(&self) -> Option<Registration> {
        self.result
            .clone()
            .and_then(|result| serde_json::from_value(result).ok())
    }
}

/// What the authority hands back for an accepted invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub invoice_registered_number: String,
    pub invoice_registered_date: String,
}

// =============================================================================
// Cancellation & Read-back
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CancelRequest<'a> {
    pub invoice_identifier: &'a str,
    /// Free-text cancellation reason.
    pub cn_motif: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetInvoiceRequest<'a> {
    pub invoice_identifier: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteInvoiceResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub result: Option<RemoteInvoiceList>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteInvoiceList {
    #[serde(default)]
    pub invoices: Vec<RemoteInvoice>,
}

/// The authority's copy of a registered invoice.
///
/// The fields used for reconciliation are typed; every other field the
/// authority returns is kept verbatim in `other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteInvoice {
    pub invoice_number: String,
    #[serde(default)]
    pub invoice_date: String,
    #[serde(default)]
    pub invoice_identifier: String,
    #[serde(default)]
    pub customer_name: String,
    /// `"1"` once canceled upstream.
    #[serde(default)]
    pub cancelled_invoice: Option<String>,
    #[serde(default)]
    pub cn_motif: Option<String>,
    #[serde(default)]
    pub invoice_items: Vec<RemoteInvoiceItem>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl RemoteInvoice {
    pub fn is_canceled(&self) -> bool {
        matches!(self.cancelled_invoice.as_deref(), Some("1") | Some("Y"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteInvoiceItem {
    pub item_designation: String,
    #[serde(default)]
    pub item_quantity: String,
    #[serde(default)]
    pub item_price: String,
    #[serde(default)]
    pub item_price_nvat: String,
    #[serde(default)]
    pub vat: String,
    #[serde(default)]
    pub item_price_wvat: String,
    #[serde(default)]
    pub item_total_amount: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_token_locations() {
        let top: LoginResponse = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(top.token(), Some("abc"));

        let nested: LoginResponse =
            serde_json::from_str(r#"{"success":true,"msg":"ok","result":{"token":"xyz"}}"#)
                .unwrap();
        assert_eq!(nested.token(), Some("xyz"));

        let none: LoginResponse = serde_json::from_str(r#"{"success":true,"result":{}}"#).unwrap();
        assert_eq!(none.token(), None);

        let empty: LoginResponse = serde_json::from_str(r#"{"token":""}"#).unwrap();
        assert_eq!(empty.token(), None);
    }

    #[test]
    fn test_rejection() {
        let rejected: Envelope =
            serde_json::from_str(r#"{"success":false,"msg":"Facture déjà enregistrée"}"#).unwrap();
        assert_eq!(rejected.rejection().as_deref(), Some("Facture déjà enregistrée"));

        let silent: Envelope = serde_json::from_str(r#"{}"#).unwrap();
        assert!(silent.rejection().is_none());
    }

    #[test]
    fn test_cancel_request_wire_names() {
        let body = serde_json::to_value(CancelRequest {
            invoice_identifier: "4000003568/demo/20240305101530/00042",
            cn_motif: "Erreur de saisie",
        })
        .unwrap();
        assert_eq!(body["cn_motif"], "Erreur de saisie");
        assert_eq!(body["invoice_identifier"], "4000003568/demo/20240305101530/00042");
    }

    #[test]
    fn test_remote_invoice_keeps_unknown_fields() {
        let response: RemoteInvoiceResponse = serde_json::from_str(
            r#"{
                "success": true,
                "msg": "",
                "result": {"invoices": [{
                    "invoice_number": "00042/2024",
                    "invoice_identifier": "4000003568/demo/20240305101530/00042",
                    "tp_TIN": "4000003568",
                    "cancelled_invoice": "1",
                    "cn_motif": "Erreur",
                    "invoice_items": [{"item_designation": "Cement", "vat": "18.00"}]
                }]}
            }"#,
        )
        .unwrap();

        let invoice = &response.result.unwrap().invoices[0];
        assert!(invoice.is_canceled());
        assert_eq!(invoice.other["tp_TIN"], "4000003568");
        assert_eq!(invoice.invoice_items[0].vat, "18.00");
    }
}
