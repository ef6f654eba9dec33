//! Run orchestration: identity replace-load, scan, flushes, reconciliation

use std::fmt;
use std::time::Instant;

use anyhow::Context;
use reciter_core::{
    BlobError, BlobStore, CheckpointStore, Filter, KeyValueSource, ProgressContext, Scanner,
    fmt_num, is_shutdown_requested, retry_with_backoff,
};
use reciter_load::{LoadMode, LoadReport, Loader, RelationalSink};
use reciter_transform::IdentityTransformer;
use rustc_hash::FxHashSet;

use crate::config::PipelineConfig;
use crate::dispatcher::{Dispatcher, RecordClass};
use crate::processor::EtlProcessor;
use crate::stats::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Replace-load identity data, clear the checkpoint, scan from the start
    Full,
    /// Resume from the checkpoint and append
    Incremental,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Full => write!(f, "full"),
            RunMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Collaborators a run reads from.
pub struct Sources<'a> {
    pub analysis: &'a dyn KeyValueSource,
    /// Required for full runs
    pub identity: Option<&'a dyn KeyValueSource>,
    pub blobs: &'a dyn BlobStore,
}

pub fn run<S: RelationalSink>(
    config: &PipelineConfig,
    mode: RunMode,
    sources: &Sources<'_>,
    loader: &mut Loader<S>,
    progress: &ProgressContext,
) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    let mut summary = RunSummary::new(mode);
    let checkpoint = CheckpointStore::new(&config.checkpoint_path);

    let resume = match mode {
        RunMode::Full => {
            let identity = sources
                .identity
                .context("full run needs an identity source")?;
            let (people, report) = load_identity(config, identity, loader, progress)?;
            summary.identity_people = Some(people);
            record_failures(&mut summary, &report);
            checkpoint.clear().context("cannot clear checkpoint")?;
            None
        }
        RunMode::Incremental => checkpoint
            .load()
            .with_context(|| format!("cannot read {}", checkpoint.path().display()))?,
    };

    let listed = list_objects(config, sources.blobs)?;
    log::info!(
        "{} objects under {}",
        fmt_num(listed.len()),
        config.blob_prefix
    );

    let scan_pb = progress.stage_line("scan");
    let processor = EtlProcessor::new(config, sources.blobs, loader, listed).with_progress(progress);
    let mut dispatcher = Dispatcher::new(processor, config.batch_threshold);
    let mut scanner = Scanner::new(sources.analysis, config.filter.clone(), config.page_size)
        .with_retry(config.scan_retry)
        .with_checkpoint(checkpoint)
        .resume_from(resume);

    while let Some(page) = scanner.next() {
        let page = match page {
            Ok(p) => p,
            Err(e) => {
                // keep what was already handed off
                dispatcher.flush_all()?;
                return Err(e).context("scan failed");
            }
        };
        for record in page {
            let class = RecordClass::of(&record, &config.routing_attribute);
            dispatcher.add(class, record);
            dispatcher.maybe_flush()?;
        }
        let stats = scanner.stats();
        scan_pb.set_message(format!(
            "{} items, {} pages",
            fmt_num(stats.items),
            fmt_num(stats.pages)
        ));
        if is_shutdown_requested() {
            log::warn!("shutdown requested, stopping scan");
            summary.interrupted = true;
            break;
        }
    }
    scan_pb.finish_and_clear();

    dispatcher.flush_all()?;
    let flushes = dispatcher.flushes();
    let mut processor = dispatcher.into_processor();
    if summary.interrupted {
        if processor.pending_second_pass() > 0 {
            log::warn!(
                "skipping second pass for {} objects",
                processor.pending_second_pass()
            );
        }
    } else {
        processor.reconcile()?;
    }
    let (process, normalize, transform) = processor.into_stats();

    // person rows of this run only exist now
    loader
        .apply_master_attributes()
        .context("cannot apply master attributes")?;

    let scan = scanner.stats();
    summary.pages = scan.pages;
    summary.items = scan.items;
    summary.inline_flushes = flushes.inline;
    summary.external_flushes = flushes.external;
    summary.objects_fetched = process.objects_fetched;
    summary.bytes_fetched = process.bytes_fetched;
    summary.deferred = process.deferred;
    summary.second_pass_recovered = process.second_pass_recovered;
    summary.fallback_recovered = process.fallback_recovered;
    summary.unrecoverable = process.unrecoverable;
    summary.graphs = normalize.graphs;
    summary.items_skipped = normalize.skipped;
    summary.articles_rejected = normalize.articles_rejected;
    summary.articles = transform.articles;
    summary.articles_skipped = transform.articles_skipped;
    summary.rows_loaded += process.rows_loaded;
    summary.failed_tables.extend(process.failed_tables);
    summary.elapsed = start.elapsed();
    Ok(summary)
}

/// Scan the identity table in full and replace-load the master data.
fn load_identity<S: RelationalSink>(
    config: &PipelineConfig,
    source: &dyn KeyValueSource,
    loader: &mut Loader<S>,
    progress: &ProgressContext,
) -> anyhow::Result<(usize, LoadReport)> {
    let pb = progress.stage_line("identity");
    let mut items = Vec::new();
    for page in Scanner::new(source, Filter::All, config.page_size).with_retry(config.scan_retry) {
        items.extend(page.context("identity scan failed")?);
        pb.set_message(format!("{} items", fmt_num(items.len())));
    }
    pb.finish_and_clear();

    let rows = IdentityTransformer::new(config.preferred_domains.clone()).transform(items)?;
    if rows.master.is_empty() {
        anyhow::bail!("identity scan produced no people, refusing to truncate the warehouse");
    }
    let people = rows.master.len();
    log::info!(
        "identity: {} people, {} person types, {} skipped",
        fmt_num(people),
        fmt_num(rows.person_types.len()),
        rows.skipped
    );

    let report = loader
        .load(&[rows.person_types], &LoadMode::Replace { reference: rows.master })
        .context("replace load failed")?;
    Ok((people, report))
}

fn list_objects(config: &PipelineConfig, blobs: &dyn BlobStore) -> anyhow::Result<FxHashSet<String>> {
    let prefix = config.blob_prefix.as_str();
    let keys = retry_with_backoff(
        &format!("list {prefix}"),
        &config.blob_retry,
        BlobError::is_retryable,
        |_| blobs.list(prefix),
    )
    .with_context(|| format!("cannot list objects under {prefix}"))?;
    Ok(keys.into_iter().collect())
}

fn record_failures(summary: &mut RunSummary, report: &LoadReport) {
    summary.rows_loaded += report.rows_loaded();
    summary.failed_tables.extend(
        report
            .failed()
            .map(|(t, e)| (t.to_string(), e.to_string())),
    );
}
