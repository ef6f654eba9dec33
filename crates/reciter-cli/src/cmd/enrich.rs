//! Enrich subcommand - citation metrics for accepted articles

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use reciter_core::TokenBucket;
use reciter_pipeline::JsonlCitationSource;

use crate::cmd::open_loader;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct EnrichArgs {
    /// Citation-metrics export (overrides config)
    #[arg(long)]
    pub citations: Option<PathBuf>,

    /// PMIDs per collaborator call (overrides config)
    #[arg(short, long)]
    pub batch_size: Option<usize>,
}

pub fn run(args: EnrichArgs, config: &Config) -> Result<ExitCode> {
    let mut enrich = config.enrich_config();
    if let Some(n) = args.batch_size {
        enrich.batch_size = n.max(1);
    }
    let path = args
        .citations
        .unwrap_or_else(|| config.enrich.citations.clone());

    let source = JsonlCitationSource::open(&path)?;
    let bucket = TokenBucket::per_second(enrich.requests_per_sec);
    let mut loader = open_loader(config)?;

    let summary = reciter_pipeline::enrich(&source, &bucket, &mut loader, &enrich)?;
    summary.log();
    Ok(ExitCode::from(summary.exit_status()))
}
