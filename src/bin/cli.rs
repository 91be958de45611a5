//! license-sync CLI
//!
//! Local execution entry point. For AWS Lambda, use `license-sync-lambda`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use license_sync::{
    config::load_config,
    error::Result,
    events::{EventSink, IngestEvent},
    models::Config,
    pipeline::{self, RunOptions},
    storage::{DocumentStore, LocalStore},
};
use tokio_util::sync::CancellationToken;

/// license-sync - Package License Mirror
#[derive(Parser, Debug)]
#[command(
    name = "license-sync",
    version,
    about = "Mirror package license exports and the SPDX license list"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror categories and ingest the transferred files
    Sync {
        /// Category to sync (repeatable, default: all configured)
        #[arg(long = "category")]
        categories: Vec<String>,
    },

    /// Refresh the stored license list
    Catalog,

    /// Run full pipeline: Sync → Catalog
    Run,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging from the verbosity flag and the configured level.
fn init_logging(verbose: bool, config_path: &Path) {
    let level = if verbose {
        "debug".to_string()
    } else {
        Config::load(config_path)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel in-flight work on Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling...");
            token.cancel();
        }
    });
    cancel
}

/// Load configuration for a pipeline command.
fn load(path: &Path) -> Result<Config> {
    let config = load_config(path)?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Open the document store; failing here aborts the process.
async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    let store = LocalStore::open(&config.store.root).await?;
    log::info!("Document store at {}", store.root().display());
    Ok(Arc::new(store))
}

/// Collect the categories reported as failed.
fn failed_categories(mut rx: tokio::sync::mpsc::UnboundedReceiver<IngestEvent>) -> Vec<String> {
    let mut failed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let IngestEvent::CategoryFailed { category, .. } = event {
            failed.push(category);
        }
    }
    failed
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, &cli.config);

    log::info!("license-sync starting...");

    match cli.command {
        Command::Sync { categories } => {
            let config = load(&cli.config)?;
            let store = open_store(&config).await?;
            let categories = if categories.is_empty() {
                config.sync.categories.clone()
            } else {
                categories
            };

            let (events, rx) = EventSink::channel();
            pipeline::run_category_sync_all(
                &config,
                store,
                &categories,
                events,
                cancel_on_interrupt(),
            )
            .await;

            let failed = failed_categories(rx);
            if failed.is_empty() {
                log::info!("Sync complete!");
            } else {
                log::warn!("Sync complete with failed categories: {}", failed.join(", "));
            }
        }

        Command::Catalog => {
            let config = load(&cli.config)?;
            let store = open_store(&config).await?;
            let cancel = cancel_on_interrupt();
            let report = pipeline::run_catalog(&config, store.as_ref(), &cancel).await?;
            log::info!(
                "Catalog {:?}: version {}, {} licenses",
                report.state,
                report.version,
                report.fetched
            );
        }

        Command::Run => {
            let config = load(&cli.config)?;
            let store = open_store(&config).await?;
            let (events, rx) = EventSink::channel();
            let report = pipeline::run_pipeline(
                &config,
                store,
                &RunOptions::default(),
                events,
                cancel_on_interrupt(),
            )
            .await?;

            let failed = failed_categories(rx);
            if !failed.is_empty() {
                log::warn!("Failed categories: {}", failed.join(", "));
            }
            if let Some(report) = report {
                log::info!("Catalog {:?}: version {}", report.state, report.version);
            }
            log::info!("Pipeline complete!");
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());
            pipeline::validate_file(&cli.config)?;
            log::info!("All validations passed!");
        }
    }

    log::info!("Done!");

    Ok(())
}
