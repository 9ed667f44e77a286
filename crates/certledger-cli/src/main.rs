//! Certledger CLI - Command-line interface for certificate stock operations

use anyhow::{Context, Result};
use certledger::prelude::*;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "certledger")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding the ledger database and fallback file
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// TOML config file (overrides --data-dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name recorded as the actor on every ledger entry
    #[arg(short, long, default_value = "cli")]
    actor: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a batch and allocate its initial stock
    CreateBatch {
        batch_id: String,

        /// Per-branch allocation as BRANCH=CERTIFICATES:MEDALS (repeatable)
        #[arg(long = "alloc", required = true)]
        allocations: Vec<String>,
    },

    /// Move stock of one batch between branches
    Migrate {
        batch_id: String,
        source: String,
        destination: String,

        #[arg(long, default_value_t = 0)]
        certificates: i64,

        #[arg(long, default_value_t = 0)]
        medals: i64,
    },

    /// Consume stock at a branch for printing
    Consume {
        batch_id: String,
        branch: String,

        #[arg(long, default_value_t = 0)]
        certificates: i64,

        #[arg(long, default_value_t = 0)]
        medals: i64,
    },

    /// Delete every batch and all stock
    ClearAll {
        /// Must be exactly "DELETE ALL BATCHES"
        #[arg(long)]
        confirm: String,
    },

    /// Stock per branch across all batches
    Summary,

    /// Batches in creation order with running totals
    Cumulative,

    /// Per-branch stock of one batch
    Stock { batch_id: String },

    /// Query the ledger log
    Logs(commands::report::LogArgs),

    /// Replay fallback entries into the ledger table
    Recover,

    /// Delete ledger entries older than the retention period
    Cleanup {
        /// Retention period in days (default: from config)
        #[arg(long)]
        days: Option<u32>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Ledger information and status
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => CertLedgerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CertLedgerConfig::for_data_dir(&cli.data_dir),
    };
    tracing::debug!("Opening ledger at {}", config.store.path.display());
    let db = CertLedger::open_with_config(config).context("Failed to open ledger")?;
    let ctx = OperationContext::new(&cli.actor).context("Invalid actor")?;

    match cli.command {
        Commands::CreateBatch {
            batch_id,
            allocations,
        } => commands::ops::create_batch(&db, &ctx, &batch_id, &allocations)?,
        Commands::Migrate {
            batch_id,
            source,
            destination,
            certificates,
            medals,
        } => commands::ops::migrate(
            &db,
            &ctx,
            &batch_id,
            &source,
            &destination,
            StockAmount::new(certificates, medals),
        )?,
        Commands::Consume {
            batch_id,
            branch,
            certificates,
            medals,
        } => commands::ops::consume(
            &db,
            &ctx,
            &batch_id,
            &branch,
            StockAmount::new(certificates, medals),
        )?,
        Commands::ClearAll { confirm } => commands::ops::clear_all(&db, &ctx, &confirm)?,
        Commands::Summary => commands::report::summary(&db)?,
        Commands::Cumulative => commands::report::cumulative(&db)?,
        Commands::Stock { batch_id } => commands::report::stock(&db, &batch_id)?,
        Commands::Logs(args) => commands::report::logs(&db, args)?,
        Commands::Recover => commands::maintenance::recover(&db)?,
        Commands::Cleanup { days, yes } => commands::maintenance::cleanup(&db, days, yes)?,
        Commands::Status => commands::maintenance::status(&db)?,
    }

    Ok(())
}
