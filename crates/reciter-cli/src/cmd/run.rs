//! Run and reload subcommands - scan the analysis table into the warehouse

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use reciter_core::{JsonlSource, KeyValueSource, SharedProgress};
use reciter_pipeline::{RunMode, Sources};

use crate::cmd::{blob_store, open_loader};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Download workers (overrides config)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Records buffered per class before a flush (overrides config)
    #[arg(short, long)]
    pub batch_threshold: Option<usize>,

    /// Items per source page (overrides config)
    #[arg(long)]
    pub page_size: Option<usize>,
}

pub fn run(args: RunArgs, mode: RunMode, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let mut pipeline = config.pipeline_config();
    if let Some(n) = args.concurrency {
        pipeline.concurrency = n.max(1);
    }
    if let Some(n) = args.batch_threshold {
        pipeline.batch_threshold = n.max(1);
    }
    if let Some(n) = args.page_size {
        pipeline.page_size = n.max(1);
    }

    log::info!("Starting {mode} run");
    log::info!("  Source: {}", config.source.analysis.display());
    log::info!("  Warehouse: {}", config.warehouse.path.display());

    let analysis = JsonlSource::new(config.source.analysis.clone());
    let identity = JsonlSource::new(config.source.identity.clone());
    let identity: &dyn KeyValueSource = &identity;
    let blobs = blob_store(config);
    let sources = Sources {
        analysis: &analysis,
        identity: (mode == RunMode::Full).then_some(identity),
        blobs: &*blobs,
    };

    let mut loader = open_loader(config)?;
    let summary = reciter_pipeline::run(&pipeline, mode, &sources, &mut loader, progress)?;
    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }

    let status = summary.exit_status();
    if status == 1 {
        log::error!("Run finished with failures");
    }
    Ok(ExitCode::from(status))
}
