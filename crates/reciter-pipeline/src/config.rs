//! Runtime configuration for one pipeline run

use std::path::PathBuf;
use std::time::Duration;

use reciter_core::{Filter, RetryPolicy};
use reciter_transform::DEFAULT_PREFERRED_DOMAINS;

/// Settings the runner needs; the CLI builds this from its TOML config.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Attribute holding the subject identifier of a source record
    pub id_attribute: String,
    /// Attribute selecting inline (`0`) vs externally stored (`1`) records
    pub routing_attribute: String,
    /// Scan predicate for the analysis table
    pub filter: Filter,
    /// Items requested per source page
    pub page_size: usize,
    /// Buffer size that triggers a flush
    pub batch_threshold: usize,
    /// Keys per fetcher call within one external flush
    pub download_batch_size: usize,
    /// Fetcher worker threads
    pub concurrency: usize,
    /// Blob key prefix; object key = prefix + identifier
    pub blob_prefix: String,
    pub download_dir: PathBuf,
    pub checkpoint_path: PathBuf,
    pub scan_retry: RetryPolicy,
    pub blob_retry: RetryPolicy,
    /// Email domains preferred for the master primary email, highest first
    pub preferred_domains: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            id_attribute: "uid".to_string(),
            routing_attribute: "usingS3".to_string(),
            filter: Filter::All,
            page_size: 1000,
            batch_threshold: 100,
            download_batch_size: 100,
            concurrency: 5,
            blob_prefix: "AnalysisOutput/".to_string(),
            download_dir: PathBuf::from("temp/s3Output"),
            checkpoint_path: PathBuf::from("temp/checkpoint.json"),
            scan_retry: RetryPolicy::source(),
            blob_retry: RetryPolicy::blob(),
            preferred_domains: DEFAULT_PREFERRED_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Worker count of the end-of-run second pass.
    pub fn second_pass_concurrency(&self) -> usize {
        (self.concurrency / 2).max(1)
    }

    /// Object key of a subject's externally stored record.
    pub fn object_key(&self, id: &str) -> String {
        format!("{}{id}", self.blob_prefix)
    }
}

/// Settings for citation-metrics enrichment.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// PMIDs per collaborator call
    pub batch_size: usize,
    /// Calls per second granted by the token bucket
    pub requests_per_sec: u32,
    pub retry: RetryPolicy,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            batch_size: 250,
            requests_per_sec: 1,
            retry: RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(144)),
        }
    }
}
