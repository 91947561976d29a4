//! # Facture CLI
//!
//! Operator front end for the invoice ledger and EBMS registration.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          facture <command>                              │
//! │                                                                         │
//! │  1. Initialize Logging ───────────────────────────────────────────────► │
//! │     • tracing-subscriber with env filter, written to stderr             │
//! │     • Default: info, can be overridden with RUST_LOG                    │
//! │                                                                         │
//! │  2. Determine Database Path ──────────────────────────────────────────► │
//! │     • --database / FACTURE_DB_PATH                                      │
//! │     • else <platform data dir>/ledger.db                                │
//! │                                                                         │
//! │  3. Open Ledger ──────────────────────────────────────────────────────► │
//! │     • SQLite with WAL mode                                              │
//! │     • Run pending migrations                                            │
//! │                                                                         │
//! │  4. Run Command ──────────────────────────────────────────────────────► │
//! │     • Success: JSON on stdout, exit 0                                   │
//! │     • Failure: {"kind", "message"} on stdout, exit 1                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use facture_db::{migrations, Database, DbConfig};
use serde_json::{json, Value};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use commands::client::ClientCommand;
use commands::invoice::InvoiceCommand;
use commands::item::ItemCommand;
use error::ApiError;

/// Facture - invoicing with EBMS tax registration.
#[derive(Parser, Debug)]
#[command(name = "facture", version, about, long_about = None)]
struct Cli {
    /// EBMS settings file (default: facture.toml in the platform config dir).
    #[arg(long, global = true, env = "FACTURE_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger database file.
    #[arg(long, global = true, env = "FACTURE_DB_PATH")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending schema migrations.
    Migrate,

    /// Manage clients.
    #[command(subcommand)]
    Client(ClientCommand),

    /// Manage invoices.
    #[command(subcommand)]
    Invoice(InvoiceCommand),

    /// Manage invoice lines.
    #[command(subcommand)]
    Item(ItemCommand),

    /// Recompute an invoice's stored totals from its items.
    Recompute { invoice_id: i64 },

    /// Register an invoice with EBMS.
    Sync { invoice_id: i64 },

    /// Cancel a registered invoice with EBMS.
    Cancel {
        invoice_id: i64,
        /// Cancellation reason sent as cn_motif.
        #[arg(long)]
        reason: String,
    },

    /// Show the EBMS copy of a registered invoice.
    Remote { invoice_id: i64 },

    /// List tax registrations, newest first.
    Registrations,

    /// Revenue, tax and status counts over the ledger.
    Summary,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(value) => {
            print_json(&value);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let api_error = match err.downcast::<ApiError>() {
                Ok(api_error) => api_error,
                Err(other) => ApiError::persistence(format!("{other:#}")),
            };
            error!(kind = %api_error.kind, message = %api_error.message, "Command failed");
            print_json(&json!(api_error));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<Value> {
    let database_path = match cli.database {
        Some(path) => path,
        None => default_database_path()?,
    };
    debug!(?database_path, "Opening ledger");

    let db = Database::new(DbConfig::new(&database_path))
        .await
        .map_err(ApiError::from)?;

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Migrate => {
            let (total, applied) = migrations::migration_status(db.pool())
                .await
                .map_err(ApiError::from)?;
            Ok(json!({
                "database": database_path,
                "migrations_total": total,
                "migrations_applied": applied,
            }))
        }
        Commands::Client(command) => commands::client::run(&db, command).await,
        Commands::Invoice(command) => commands::invoice::run(&db, command).await,
        Commands::Item(command) => commands::item::run(&db, command).await,
        Commands::Recompute { invoice_id } => commands::item::recompute(&db, invoice_id).await,
        Commands::Sync { invoice_id } => commands::sync::sync(&db, config_path, invoice_id).await,
        Commands::Cancel { invoice_id, reason } => {
            commands::sync::cancel(&db, config_path, invoice_id, &reason).await
        }
        Commands::Remote { invoice_id } => {
            commands::sync::remote(&db, config_path, invoice_id).await
        }
        Commands::Registrations => commands::sync::registrations(&db).await,
        Commands::Summary => commands::invoice::summary(&db).await,
    };

    db.close().await;
    Ok(result?)
}

/// Initializes the tracing subscriber. Logs go to stderr so stdout carries
/// only the JSON result.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=facture_ebms=trace` - Trace the sync layer only
/// - Default: info, sqlx at warn
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `<platform data dir>/ledger.db`, creating the directory if needed.
///
/// ## Platform-Specific Paths
/// - **macOS**: `~/Library/Application Support/com.facture.facture/ledger.db`
/// - **Windows**: `%APPDATA%\facture\facture\data\ledger.db`
/// - **Linux**: `~/.local/share/facture/ledger.db`
fn default_database_path() -> anyhow::Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "facture", "facture")
        .context("could not determine the platform data directory")?;

    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("could not create {}", data_dir.display()))?;

    Ok(data_dir.join("ledger.db"))
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use facture_core::ErrorKind;

    fn cli(db_path: &std::path::Path, args: &[&str]) -> Cli {
        let mut argv = vec![
            "facture".to_string(),
            "--database".to_string(),
            db_path.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        Cli::try_parse_from(argv).unwrap()
    }

    fn api_error(err: anyhow::Error) -> ApiError {
        err.downcast::<ApiError>().unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_arguments() {
        let parsed = Cli::try_parse_from([
            "facture", "item", "add", "4", "--description", "Cement", "--quantity", "3",
            "--unit-price", "25.50",
        ])
        .unwrap();
        match parsed.command {
            Commands::Item(ItemCommand::Add {
                invoice_id,
                quantity,
                unit_price,
                ..
            }) => {
                assert_eq!(invoice_id, 4);
                assert_eq!(quantity, 3);
                assert_eq!(unit_price.cents(), 2550);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["facture", "client", "status", "1", "archived"]).is_err());
        assert!(Cli::try_parse_from(["facture", "cancel", "1"]).is_err());
    }

    #[tokio::test]
    async fn test_invoice_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");

        let client = run(cli(
            &db_path,
            &[
                "client", "add", "--name", "Kaze Trading", "--email", "kaze@example.bi",
                "--phone", "+25779000002", "--company", "Kaze SPRL", "--vat-taxpayer",
            ],
        ))
        .await
        .unwrap();
        let client_id = client["id"].as_i64().unwrap().to_string();

        let invoice = run(cli(
            &db_path,
            &["invoice", "create", "--number", "00001/2024", "--client", &client_id],
        ))
        .await
        .unwrap();
        let invoice_id = invoice["id"].as_i64().unwrap().to_string();

        let added = run(cli(
            &db_path,
            &[
                "item", "add", &invoice_id, "--description", "Cement", "--quantity", "2",
                "--unit-price", "100",
            ],
        ))
        .await
        .unwrap();
        assert_eq!(added["invoice"]["total_amount_cents"], 23_600);
        assert_eq!(added["invoice"]["tax_amount_cents"], 3_600);

        let detail = run(cli(&db_path, &["invoice", "show", &invoice_id]))
            .await
            .unwrap();
        assert_eq!(detail["items"].as_array().unwrap().len(), 1);
        assert!(detail["registration"].is_null());

        let summary = run(cli(&db_path, &["summary"])).await.unwrap();
        assert_eq!(summary["invoice_count"], 1);
        assert_eq!(summary["unsynced"], 1);
    }

    #[tokio::test]
    async fn test_client_update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        let fields = [
            "--name", "Kaze Trading", "--email", "kaze@example.bi", "--phone", "+25779000002",
            "--company", "Kaze SPRL",
        ];

        let mut add = vec!["client", "add"];
        add.extend(fields);
        let client = run(cli(&db_path, &add)).await.unwrap();
        let client_id = client["id"].as_i64().unwrap().to_string();
        assert_eq!(client["vat_taxpayer"], false);

        let mut update = vec!["client", "update", client_id.as_str()];
        update.extend(fields);
        update.push("--vat-taxpayer");
        let updated = run(cli(&db_path, &update)).await.unwrap();
        assert_eq!(updated["vat_taxpayer"], true);

        let invoice = run(cli(
            &db_path,
            &["invoice", "create", "--number", "00001/2024", "--client", &client_id],
        ))
        .await
        .unwrap();
        let err = api_error(
            run(cli(&db_path, &["client", "delete", &client_id]))
                .await
                .unwrap_err(),
        );
        assert_eq!(err.kind, ErrorKind::Validation);

        let invoice_id = invoice["id"].as_i64().unwrap().to_string();
        run(cli(&db_path, &["invoice", "delete", &invoice_id]))
            .await
            .unwrap();
        let deleted = run(cli(&db_path, &["client", "delete", &client_id]))
            .await
            .unwrap();
        assert_eq!(deleted["deleted"], client["id"]);
    }

    #[tokio::test]
    async fn test_errors_carry_kind() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");

        let err = api_error(run(cli(&db_path, &["invoice", "show", "99"])).await.unwrap_err());
        assert_eq!(err.kind, ErrorKind::NotFound);

        let err = api_error(run(cli(&db_path, &["recompute", "99"])).await.unwrap_err());
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_migrate_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");

        let status = run(cli(&db_path, &["migrate"])).await.unwrap();
        assert_eq!(status["migrations_total"], status["migrations_applied"]);
    }
}
