//! Transaction Statistics CLI
//!
//! Drives the statistics service against a journal file:
//! - `ingest` appends JSON-lines transactions
//! - `stats` and `snapshot` replay the journal and print the result
//! - `clear` deletes every stored transaction

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use services_common::{ServiceError, TransactionCreate};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transaction_stats::{
    JournalTransactionStore, StatisticsConfig, StatisticsService, TransactionService,
};

const SERVICE_NAME: &str = "transaction-stats";

#[derive(Parser)]
#[command(name = "transaction-stats")]
#[command(about = "Incremental statistics over ingested transactions")]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Journal file, overrides the configured path
    #[arg(long)]
    journal: Option<PathBuf>,

    /// Number of top transactions to report, overrides the configured value
    #[arg(long)]
    top_k: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append transactions from a JSON-lines file
    Ingest {
        /// One `TransactionCreate` object per line
        file: PathBuf,
    },
    /// Print the statistics response
    Stats,
    /// Print the full engine snapshot
    Snapshot,
    /// Delete every stored transaction
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    info!("Starting Transaction Statistics v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(JournalTransactionStore::open(&config.journal_path)?);
    let service = TransactionService::new(config, store)?;
    let recovered = service.recover().await?;
    info!(
        "Recovered {} transactions in {}ms",
        recovered.records_replayed, recovered.recovery_time_ms
    );

    match cli.command {
        Commands::Ingest { file } => ingest(&service, file).await?,
        Commands::Stats => {
            let stats = service.get_statistics().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Snapshot => {
            let snapshot = service.snapshot()?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Clear => {
            let removed = service.delete_transactions().await?;
            println!("Deleted {removed} transactions");
        }
    }

    let dispatched = service.shutdown().await?;
    info!(
        "Shutdown complete: {} inserts, {} resets applied",
        dispatched.inserts_applied, dispatched.resets_applied
    );
    Ok(())
}

fn load_config(cli: &Cli) -> Result<StatisticsConfig> {
    let mut config = match &cli.config {
        Some(path) => StatisticsConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StatisticsConfig::default(),
    };
    if let Some(journal) = &cli.journal {
        config.journal_path.clone_from(journal);
    }
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }
    config.validate()?;
    Ok(config)
}

async fn ingest(service: &TransactionService, file: PathBuf) -> Result<()> {
    let reader = BufReader::new(
        std::fs::File::open(&file).with_context(|| format!("opening {}", file.display()))?,
    );

    let mut accepted = 0u64;
    let mut rejected = 0u64;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let request: TransactionCreate = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), index + 1))?;
        match service.create_transaction(request).await {
            Ok(_) => accepted += 1,
            Err(e @ (ServiceError::AlreadyExists(_) | ServiceError::InvalidRequest(_))) => {
                warn!("Skipping line {}: {}", index + 1, e);
                rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    service.flush().await?;
    println!("Ingested {accepted} transactions ({rejected} rejected)");
    Ok(())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", SERVICE_NAME.replace('-', "_")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
    Ok(())
}
