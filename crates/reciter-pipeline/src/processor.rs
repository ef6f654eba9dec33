//! Flush handler: fetch → normalize → transform → append load
//!
//! Externally stored records whose object download fails are kept aside
//! for one reduced-concurrency second pass at the end of the run. Whatever
//! still fails, and every record whose object was never listed, falls back
//! to the feature graph embedded in the source record, if there is one.

use anyhow::Context;
use reciter_core::{BlobStore, FetchOutcome, Fetcher, ProgressContext};
use reciter_load::{LoadMode, Loader, RelationalSink};
use reciter_transform::{FeatureGraph, NormalizeStats, Normalizer, TransformStats, Transformer};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::dispatcher::{BatchProcessor, RecordClass};

/// Failure-report entry for an external record without an identifier
pub const MISSING_ID: &str = "<missing id>";

#[derive(Debug, Default, Clone)]
pub struct ProcessStats {
    pub objects_fetched: usize,
    pub bytes_fetched: u64,
    /// Keys that failed their first download
    pub deferred: usize,
    pub second_passes: usize,
    pub second_pass_recovered: usize,
    pub fallback_recovered: usize,
    /// Subjects whose data could not be recovered by any path
    pub unrecoverable: Vec<String>,
    pub rows_loaded: usize,
    /// `(table, error)` of every failed table load
    pub failed_tables: Vec<(String, String)>,
}

pub struct EtlProcessor<'a, S> {
    config: &'a PipelineConfig,
    blobs: &'a dyn BlobStore,
    loader: &'a mut Loader<S>,
    /// Object keys present in the store at the start of the run
    listed: FxHashSet<String>,
    deferred: Vec<(String, Value)>,
    reconciled: bool,
    normalizer: Normalizer,
    transformer: Transformer,
    progress: Option<&'a ProgressContext>,
    stats: ProcessStats,
}

impl<'a, S: RelationalSink> EtlProcessor<'a, S> {
    pub fn new(
        config: &'a PipelineConfig,
        blobs: &'a dyn BlobStore,
        loader: &'a mut Loader<S>,
        listed: FxHashSet<String>,
    ) -> Self {
        Self {
            config,
            blobs,
            loader,
            listed,
            deferred: Vec::new(),
            reconciled: false,
            normalizer: Normalizer::new(),
            transformer: Transformer::new(),
            progress: None,
            stats: ProcessStats::default(),
        }
    }

    pub fn with_progress(mut self, progress: &'a ProgressContext) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn stats(&self) -> &ProcessStats {
        &self.stats
    }

    /// Keys waiting for the second pass.
    pub fn pending_second_pass(&self) -> usize {
        self.deferred.len()
    }

    pub fn into_stats(self) -> (ProcessStats, NormalizeStats, TransformStats) {
        (
            self.stats,
            self.normalizer.stats(),
            self.transformer.stats().clone(),
        )
    }

    /// Second pass over failed downloads, then fallback for what is left.
    /// Runs at most once; later calls are no-ops.
    pub fn reconcile(&mut self) -> anyhow::Result<()> {
        if self.reconciled {
            log::debug!("second pass already ran");
            return Ok(());
        }
        self.reconciled = true;
        let deferred = std::mem::take(&mut self.deferred);
        if deferred.is_empty() {
            return Ok(());
        }

        let concurrency = self.config.second_pass_concurrency();
        log::info!(
            "second pass: retrying {} objects with {concurrency} workers",
            deferred.len()
        );
        self.stats.second_passes += 1;
        let keys: Vec<String> = deferred.iter().map(|(k, _)| k.clone()).collect();
        let FetchOutcome { succeeded, failed } = self.fetch(&keys, concurrency, "retry")?;

        let mut graphs = Vec::new();
        self.stats.second_pass_recovered += succeeded.len();
        self.stats.objects_fetched += succeeded.len();
        for obj in succeeded {
            self.stats.bytes_fetched += obj.bytes;
            graphs.extend(obj.records.into_iter().filter_map(|r| self.normalizer.normalize(r)));
        }

        let still_failing: FxHashSet<&str> = failed.iter().map(|f| f.key.as_str()).collect();
        for (key, record) in deferred {
            if still_failing.contains(key.as_str()) {
                let id = key
                    .strip_prefix(self.config.blob_prefix.as_str())
                    .unwrap_or(&key)
                    .to_string();
                log::warn!("{id}: second pass failed, falling back to source record");
                graphs.extend(self.fallback(id, record));
            }
        }
        self.load_graphs(graphs)
    }

    fn process_inline(&mut self, batch: Vec<Value>) -> anyhow::Result<()> {
        let mut graphs = Vec::with_capacity(batch.len());
        for record in batch {
            graphs.extend(self.normalizer.normalize(record));
        }
        self.load_graphs(graphs)
    }

    fn process_external(&mut self, batch: Vec<Value>) -> anyhow::Result<()> {
        let mut records: FxHashMap<String, Value> = FxHashMap::default();
        let mut keys = Vec::with_capacity(batch.len());
        let mut unlisted = Vec::new();

        for record in batch {
            let Some(id) = record.get(&self.config.id_attribute).and_then(id_text) else {
                log::warn!("skipping external record without {}", self.config.id_attribute);
                self.stats.unrecoverable.push(MISSING_ID.to_string());
                continue;
            };
            let key = self.config.object_key(&id);
            if !self.listed.contains(&key) {
                log::debug!("{id}: {key} not in store listing");
                unlisted.push((id, record));
                continue;
            }
            if records.insert(key.clone(), record).is_none() {
                keys.push(key);
            }
        }

        let mut graphs = Vec::new();
        for (id, record) in unlisted {
            graphs.extend(self.fallback(id, record));
        }
        self.load_graphs(graphs)?;

        let sub_batch = self.config.download_batch_size.max(1);
        for chunk in keys.chunks(sub_batch) {
            let FetchOutcome { succeeded, failed } =
                self.fetch(chunk, self.config.concurrency, "fetch")?;
            let mut graphs = Vec::new();
            self.stats.objects_fetched += succeeded.len();
            for obj in succeeded {
                self.stats.bytes_fetched += obj.bytes;
                graphs.extend(obj.records.into_iter().filter_map(|r| self.normalizer.normalize(r)));
            }
            for f in failed {
                if let Some(record) = records.remove(&f.key) {
                    self.stats.deferred += 1;
                    self.deferred.push((f.key, record));
                }
            }
            self.load_graphs(graphs)?;
        }
        Ok(())
    }

    fn fetch(&self, keys: &[String], concurrency: usize, stage: &str) -> anyhow::Result<FetchOutcome> {
        let mut fetcher = Fetcher::new(self.blobs, self.config.download_dir.clone())
            .with_retry(self.config.blob_retry);
        let pb = self.progress.map(|p| p.count_bar(stage, keys.len() as u64));
        if let Some(pb) = &pb {
            fetcher = fetcher.with_progress(pb.clone());
        }
        let outcome = fetcher
            .fetch(keys, concurrency)
            .with_context(|| format!("{stage}: cannot start download workers"))?;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        Ok(outcome)
    }

    /// Best-effort recovery from the source record itself.
    fn fallback(&mut self, id: String, record: Value) -> Option<FeatureGraph> {
        if !embeds_feature_graph(&record) {
            log::warn!("{id}: no usable feature graph in source record");
            self.stats.unrecoverable.push(id);
            return None;
        }
        match self.normalizer.normalize(record) {
            Some(graph) => {
                self.stats.fallback_recovered += 1;
                Some(graph)
            }
            None => {
                self.stats.unrecoverable.push(id);
                None
            }
        }
    }

    fn load_graphs(&mut self, graphs: Vec<FeatureGraph>) -> anyhow::Result<()> {
        if graphs.is_empty() {
            return Ok(());
        }
        let sets = self.transformer.transform(&graphs);
        drop(graphs);
        let report = self
            .loader
            .load(&sets, &LoadMode::Append)
            .context("append load failed")?;
        self.stats.rows_loaded += report.rows_loaded();
        self.stats
            .failed_tables
            .extend(report.failed().map(|(t, e)| (t.to_string(), e.to_string())));
        Ok(())
    }
}

impl<S: RelationalSink> BatchProcessor for EtlProcessor<'_, S> {
    fn process(&mut self, class: RecordClass, batch: Vec<Value>) -> anyhow::Result<()> {
        match class {
            RecordClass::Inline => self.process_inline(batch),
            RecordClass::External => self.process_external(batch),
        }
    }
}

fn id_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether a source record carries feature data of its own.
fn embeds_feature_graph(record: &Value) -> bool {
    record.get("reCiterFeature").is_some_and(Value::is_object)
        || record.get("reCiterArticleFeatures").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_text_accepts_strings_and_numbers() {
        assert_eq!(id_text(&json!(" abc1001 ")), Some("abc1001".into()));
        assert_eq!(id_text(&json!(42)), Some("42".into()));
        assert_eq!(id_text(&json!("")), None);
        assert_eq!(id_text(&json!(null)), None);
    }

    #[test]
    fn embedded_graph_detection() {
        assert!(embeds_feature_graph(&json!({"reCiterFeature": {"personIdentifier": "a"}})));
        assert!(embeds_feature_graph(&json!({"uid": "a", "reCiterArticleFeatures": []})));
        assert!(!embeds_feature_graph(&json!({"uid": "a", "usingS3": 1})));
        assert!(!embeds_feature_graph(&json!({"reCiterFeature": "s3"})));
    }
}
