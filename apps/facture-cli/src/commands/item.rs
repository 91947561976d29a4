//! `facture item ...` and `facture recompute`
//!
//! Item writes go through the Totals Engine so the invoice's stored totals
//! change in the same transaction.

use clap::Subcommand;
use facture_core::{Money, NewInvoiceItem, ValidationError};
use facture_db::{Database, DbError};
use serde_json::json;
use tracing::info;

use super::{to_json, CommandResult};

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    /// Add a line to an invoice and recompute its totals.
    Add {
        invoice_id: i64,
        #[arg(long)]
        description: String,
        #[arg(long)]
        quantity: i64,
        /// Unit price in major units, e.g. 2500 or 12.50.
        #[arg(long, value_parser = parse_money)]
        unit_price: Money,
    },

    /// Remove a line and recompute its invoice's totals.
    Remove { item_id: i64 },

    /// List an invoice's lines.
    List { invoice_id: i64 },
}

fn parse_money(input: &str) -> Result<Money, ValidationError> {
    Money::parse_decimal(input)
}

pub async fn run(db: &Database, command: ItemCommand) -> CommandResult {
    match command {
        ItemCommand::Add {
            invoice_id,
            description,
            quantity,
            unit_price,
        } => {
            let item = db
                .totals()
                .add_item(NewInvoiceItem {
                    invoice_id,
                    description,
                    quantity,
                    unit_price,
                })
                .await?;
            let invoice = db
                .invoices()
                .get_by_id(invoice_id)
                .await?
                .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;

            info!(invoice_id, item_id = item.id, total = %invoice.total_amount(), "Item added");
            to_json(&json!({ "item": item, "invoice": invoice }))
        }

        ItemCommand::Remove { item_id } => {
            let totals = db.totals().remove_item(item_id).await?;
            info!(item_id, total = %totals.total, "Item removed");
            to_json(&totals)
        }

        ItemCommand::List { invoice_id } => {
            if db.invoices().get_by_id(invoice_id).await?.is_none() {
                return Err(DbError::not_found("Invoice", invoice_id).into());
            }
            to_json(&db.items().list_by_invoice(invoice_id).await?)
        }
    }
}

pub async fn recompute(db: &Database, invoice_id: i64) -> CommandResult {
    let totals = db.totals().recompute(invoice_id).await?;
    to_json(&totals)
}
