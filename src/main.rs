use clap::Parser;
use expense_approvals::application::engine::ApprovalEngine;
use expense_approvals::interfaces::config::Directory;
use expense_approvals::interfaces::csv::command_reader::CommandReader;
use expense_approvals::interfaces::csv::status_writer::StatusWriter;
use expense_approvals::interfaces::runner::CommandRunner;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// JSON file listing users, approval sequences and engine rules
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[cfg(feature = "storage-rocksdb")]
fn build_engine(db_path: Option<PathBuf>) -> Result<ApprovalEngine> {
    use expense_approvals::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(db_path) => {
            // One RocksDB instance serves every store port
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            Ok(ApprovalEngine::new(
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store),
            ))
        }
        None => Ok(ApprovalEngine::in_memory()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_engine(db_path: Option<PathBuf>) -> Result<ApprovalEngine> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(ApprovalEngine::in_memory())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let directory = match cli.directory {
        Some(path) => Directory::load(path).into_diagnostic()?,
        None => Directory::default(),
    };
    let engine = build_engine(cli.db_path)?.with_config(directory.engine);

    for template in directory.templates() {
        engine.register_template(template).await.into_diagnostic()?;
    }

    // Process commands
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    let runner = CommandRunner::new(&engine, &directory);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.apply(command).await {
                    error!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                error!("Error reading command: {}", e);
            }
        }
    }

    // Output final state
    let expenses = engine.expenses().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = StatusWriter::new(stdout.lock());
    writer.write_expenses(expenses).into_diagnostic()?;

    Ok(())
}
