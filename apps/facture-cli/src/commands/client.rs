//! `facture client ...`

use clap::{Args, Subcommand};
use facture_core::{ClientStatus, NewClient};
use facture_db::Database;
use tracing::{debug, info};

use super::{to_json, CommandResult};

/// Client fields shared by `add` and `update`.
#[derive(Args, Debug)]
pub struct ClientFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    company: String,
    /// Client TIN, sent as customer_TIN.
    #[arg(long)]
    tax_id: Option<String>,
    #[arg(long)]
    address: Option<String>,
    /// The client is subject to VAT (18%); otherwise 0%.
    #[arg(long)]
    vat_taxpayer: bool,
}

impl From<ClientFields> for NewClient {
    fn from(fields: ClientFields) -> Self {
        NewClient {
            name: fields.name,
            email: fields.email,
            phone: fields.phone,
            company: fields.company,
            tax_id: fields.tax_id,
            address: fields.address,
            vat_taxpayer: fields.vat_taxpayer,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ClientCommand {
    /// Register a new client.
    Add {
        #[command(flatten)]
        fields: ClientFields,
    },

    /// Replace a client's details. Existing invoices are recomputed only
    /// on their next item change or `recompute`.
    Update {
        id: i64,
        #[command(flatten)]
        fields: ClientFields,
    },

    /// Delete a client that has no invoices.
    Delete { id: i64 },

    /// List clients, optionally by status.
    List {
        #[arg(long)]
        status: Option<ClientStatus>,
    },

    /// Set a client's status (active, inactive).
    Status { id: i64, status: ClientStatus },
}

pub async fn run(db: &Database, command: ClientCommand) -> CommandResult {
    match command {
        ClientCommand::Add { fields } => {
            let client = db.clients().create(&fields.into()).await?;
            info!(client_id = client.id, "Client added");
            to_json(&client)
        }

        ClientCommand::Update { id, fields } => {
            let client = db.clients().update(id, &fields.into()).await?;
            to_json(&client)
        }

        ClientCommand::Delete { id } => {
            db.clients().delete(id).await?;
            to_json(&serde_json::json!({ "deleted": id }))
        }

        ClientCommand::List { status } => {
            let clients = db.clients().list(status).await?;
            debug!(count = clients.len(), "Clients listed");
            to_json(&clients)
        }

        ClientCommand::Status { id, status } => {
            let client = db.clients().set_status(id, status).await?;
            to_json(&client)
        }
    }
}
