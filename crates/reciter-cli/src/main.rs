//! reciter-etl - incremental ETL from the analysis table into the warehouse
//!
//! Scans researcher feature records, fetches externally stored ones from
//! the blob store, flattens them into tables and bulk-loads a DuckDB
//! warehouse. Also enriches accepted articles with citation metrics.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reciter_pipeline::RunMode;

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "reciter-etl")]
#[command(about = "Incremental ETL of researcher feature records into a relational warehouse")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./reciter-etl.toml or ~/.config/reciter-etl/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Incremental run: resume from the checkpoint and append
    Run(cmd::run::RunArgs),
    /// Full run: replace-load identity data and rescan from the beginning
    Reload(cmd::run::RunArgs),
    /// Enrich accepted articles with citation metrics
    Enrich(cmd::enrich::EnrichArgs),
    /// Show checkpoint position and warehouse row counts
    Status,
    /// Clear the checkpoint
    Reset,
    /// Create the warehouse schema
    InitDb,
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(reciter_core::ProgressContext::new());

    // TTY: warn unless --debug, the bars show activity
    // non-TTY: info unless --debug
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    reciter_core::init_logging(quiet, cli.debug, multi);

    if let Err(e) = reciter_core::install_signal_handlers() {
        log::warn!("Could not install signal handlers: {e}");
    }

    match dispatch(cli, &progress) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn dispatch(cli: Cli, progress: &reciter_core::SharedProgress) -> Result<ExitCode> {
    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Run(args) => cmd::run::run(args, RunMode::Incremental, &config, progress),
        Command::Reload(args) => cmd::run::run(args, RunMode::Full, &config, progress),
        Command::Enrich(args) => cmd::enrich::run(args, &config),
        Command::Status => cmd::status::run(&config).map(|()| ExitCode::SUCCESS),
        Command::Reset => cmd::reset::run(&config).map(|()| ExitCode::SUCCESS),
        Command::InitDb => cmd::init_db::run(&config).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            cmd::config::run(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}
