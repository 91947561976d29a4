//! # CLI Commands
//!
//! One module per command group. Handlers take the opened [`Database`]
//! and their parsed arguments, and return the JSON printed on stdout.
//!
//! ## Command Categories
//! - [`client`] - Client records and VAT status
//! - [`invoice`] - Invoice CRUD, listing and the ledger summary
//! - [`item`] - Line items; every change goes through the Totals Engine
//! - [`sync`] - EBMS registration, cancellation and read-back
//!
//! [`Database`]: facture_db::Database

pub mod client;
pub mod invoice;
pub mod item;
pub mod sync;

use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// What every handler returns.
pub type CommandResult = Result<Value, ApiError>;

/// Serializes a handler result.
pub(crate) fn to_json<T: Serialize>(value: &T) -> CommandResult {
    Ok(serde_json::to_value(value)?)
}
