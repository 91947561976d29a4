//! `facture invoice ...` and `facture summary`

use chrono::{DateTime, Utc};
use clap::Subcommand;
use facture_core::{
    Currency, FiscalCenter, Invoice, InvoiceFilter, InvoiceItem, InvoiceSort, InvoiceStatus,
    InvoiceType, Money, NewInvoice, PaymentType, TaxRegistration,
};
use facture_db::{Database, DbError};
use serde::Serialize;
use tracing::info;

use super::{to_json, CommandResult};

#[derive(Subcommand, Debug)]
pub enum InvoiceCommand {
    /// Create an empty invoice; add lines with `facture item add`.
    Create {
        /// Invoice number, e.g. 00042/2024.
        #[arg(long)]
        number: String,
        #[arg(long)]
        client: i64,
        /// FN, FA, RC or RHF.
        #[arg(long = "type")]
        invoice_type: Option<InvoiceType>,
        /// 1-5 or cash, card, bank, mobile, other.
        #[arg(long)]
        payment: Option<PaymentType>,
        #[arg(long)]
        currency: Option<Currency>,
        #[arg(long)]
        fiscal_center: Option<FiscalCenter>,
        #[arg(long)]
        status: Option<InvoiceStatus>,
        /// Issue timestamp (RFC 3339); defaults to now.
        #[arg(long)]
        date: Option<DateTime<Utc>>,
    },

    /// List invoices.
    List {
        #[arg(long)]
        client: Option<i64>,
        #[arg(long)]
        status: Option<InvoiceStatus>,
        /// true: registered with EBMS only; false: not yet registered.
        #[arg(long)]
        synced: Option<bool>,
        /// Matches invoice number or client name.
        #[arg(long)]
        search: Option<String>,
        /// date-desc, date-asc, number-asc, number-desc, amount-asc or amount-desc.
        #[arg(long, default_value = "date-desc")]
        sort: InvoiceSort,
    },

    /// Show an invoice with its items and tax registration.
    Show { id: i64 },

    /// Set the payment status (pending, paid, overdue).
    Status { id: i64, status: InvoiceStatus },

    /// Delete an invoice and its items. Registered invoices are kept.
    Delete { id: i64 },
}

/// `invoice show` output.
#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub subtotal: Money,
    pub items: Vec<InvoiceItem>,
    pub registration: Option<TaxRegistration>,
}

pub async fn run(db: &Database, command: InvoiceCommand) -> CommandResult {
    match command {
        InvoiceCommand::Create {
            number,
            client,
            invoice_type,
            payment,
            currency,
            fiscal_center,
            status,
            date,
        } => {
            let mut new_invoice = NewInvoice::new(number, client);
            if let Some(invoice_type) = invoice_type {
                new_invoice.invoice_type = invoice_type;
            }
            if let Some(payment) = payment {
                new_invoice.payment_type = payment;
            }
            if let Some(currency) = currency {
                new_invoice.currency = currency;
            }
            if let Some(fiscal_center) = fiscal_center {
                new_invoice.fiscal_center = fiscal_center;
            }
            if let Some(status) = status {
                new_invoice.status = status;
            }
            new_invoice.created_at = date;

            let invoice = db.invoices().create(&new_invoice).await?;
            info!(invoice_id = invoice.id, number = %invoice.invoice_number, "Invoice created");
            to_json(&invoice)
        }

        InvoiceCommand::List {
            client,
            status,
            synced,
            search,
            sort,
        } => {
            let filter = InvoiceFilter {
                client_id: client,
                status,
                synced,
                search,
                sort,
            };
            to_json(&db.invoices().list(&filter).await?)
        }

        InvoiceCommand::Show { id } => to_json(&show(db, id).await?),

        InvoiceCommand::Status { id, status } => {
            let invoice = db.invoices().set_status(id, status).await?;
            to_json(&invoice)
        }

        InvoiceCommand::Delete { id } => {
            db.invoices().delete(id).await?;
            info!(invoice_id = id, "Invoice deleted");
            to_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

pub async fn show(db: &Database, id: i64) -> Result<InvoiceDetail, DbError> {
    let invoice = db
        .invoices()
        .get_by_id(id)
        .await?
        .ok_or_else(|| DbError::not_found("Invoice", id))?;
    let items = db.items().list_by_invoice(id).await?;
    let registration = db.tax_registrations().get_by_invoice(id).await?;

    Ok(InvoiceDetail {
        subtotal: invoice.subtotal(),
        invoice,
        items,
        registration,
    })
}

pub async fn summary(db: &Database) -> CommandResult {
    to_json(&db.invoices().summary().await?)
}
