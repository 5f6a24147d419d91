//! epq-rates - Append-only historical logger for Épargne Placements Québec rates
//!
//! Meant to be scheduled daily: each run records the published rates once per
//! effective date.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use epq_rates::commands::{CheckCommand, RunCommand, StatusCommand};
use epq_rates::config::{Config, OutputFormat};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "epq-rates",
    version,
    about = "Append-only historical logger for Épargne Placements Québec rates",
    long_about = "Fetches https://epq.gouv.qc.ca/taux-en-vigueur/, extracts the effective date and \
                  every published rate, and appends one batch per new date to a CSV history."
)]
struct Cli {
    /// Rates page URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Historical CSV store
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Output format (table, json, csv)
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Never escalate to headless Chrome
    #[arg(long, global = true)]
    no_render: bool,

    /// Also append logs to this file
    #[arg(long, global = true, env = "EPQ_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the page and append a new batch (default)
    #[command(alias = "r")]
    Run {
        /// Extract and print the batch without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Summarize the store
    Status,

    /// Validate the setup
    Check {
        /// Also fetch the live page (nothing is written)
        #[arg(long)]
        full: bool,
    },
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

/// `--verbose` forces DEBUG; otherwise a non-empty, valid `RUST_LOG` wins over INFO.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new(Level::DEBUG.to_string());
    }

    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(Level::INFO.to_string()))
}

/// Installs the console subscriber, plus a plain-text file layer when asked.
///
/// The returned guard flushes the file writer on drop and must outlive `run`.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(verbose, rust_log.as_deref());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            let layer = fmt::layer().with_ansi(false).with_target(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(url) = cli.url {
        config.url = url;
    }
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }
    if let Some(format) = cli.format {
        config.format = format;
    }
    if cli.no_render {
        config.render = false;
    }

    match cli.command.unwrap_or(Commands::Run { dry_run: false }) {
        Commands::Run { dry_run } => {
            let output = RunCommand::new(config).execute(dry_run).await?;
            println!("{}", output);
        }

        Commands::Status => {
            let output = StatusCommand::new(config).execute()?;
            println!("{}", output);
        }

        Commands::Check { full } => {
            let report = CheckCommand::new(config).execute(full).await?;
            println!("{}", report.output);
            if !report.passed {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_logging(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Run failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
