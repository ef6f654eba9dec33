//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reciter_core::{Filter, RetryPolicy};
use reciter_pipeline::{EnrichConfig, PipelineConfig};
use reciter_transform::DEFAULT_PREFERRED_DOMAINS;
use serde::Deserialize;

const APP_NAME: &str = "reciter-etl";

/// Global configuration for reciter-etl
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub blob: BlobConfig,
    pub pipeline: PipelineSection,
    pub warehouse: WarehouseConfig,
    pub state: StateConfig,
    pub identity: IdentityConfig,
    pub enrich: EnrichSection,
}

/// Key-value table exports (newline-delimited JSON)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub analysis: PathBuf,
    pub identity: PathBuf,
    pub id_attribute: String,
    pub routing_attribute: String,
    /// Only scan items whose `filter_attribute` equals `filter_value`
    pub filter_attribute: Option<String>,
    pub filter_value: Option<String>,
    pub page_size: usize,
    pub max_retries: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            analysis: PathBuf::from("data/analysis.jsonl"),
            identity: PathBuf::from("data/identity.jsonl"),
            id_attribute: "uid".to_string(),
            routing_attribute: "usingS3".to_string(),
            filter_attribute: None,
            filter_value: None,
            page_size: 1000,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Bucket base URL; the local `root` directory is used when unset
    #[serde(deserialize_with = "deserialize_env_var")]
    pub url: Option<String>,
    pub root: PathBuf,
    pub prefix: String,
    /// Read timeout in seconds for stall detection
    pub read_timeout: u64,
    pub max_retries: u32,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("RECITER_BUCKET_URL").ok(),
            root: PathBuf::from("data/blobs"),
            prefix: "AnalysisOutput/".to_string(),
            read_timeout: 30,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub batch_threshold: usize,
    pub download_batch_size: usize,
    pub concurrency: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            batch_threshold: 100,
            download_batch_size: 100,
            concurrency: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// DuckDB database file
    pub path: PathBuf,
    pub max_retries: u32,
    /// Drop and recreate secondary indexes around full reloads
    pub manage_indexes: bool,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reciter.duckdb"),
            max_retries: 10,
            manage_indexes: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub checkpoint: PathBuf,
    pub download_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            checkpoint: PathBuf::from("temp/checkpoint.json"),
            download_dir: PathBuf::from("temp/s3Output"),
            staging_dir: PathBuf::from("temp/staging"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Email domains preferred for the primary email, highest first
    pub preferred_domains: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            preferred_domains: DEFAULT_PREFERRED_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichSection {
    /// Citation-metrics export (newline-delimited JSON)
    pub citations: PathBuf,
    pub batch_size: usize,
    pub requests_per_sec: u32,
    pub max_retries: u32,
}

impl Default for EnrichSection {
    fn default() -> Self {
        Self {
            citations: PathBuf::from("data/citations.jsonl"),
            batch_size: 250,
            requests_per_sec: 1,
            max_retries: 10,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./reciter-etl.toml (current directory)
    /// 2. ~/.config/reciter-etl/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from(format!("{APP_NAME}.toml"));
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", APP_NAME) {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn filter(&self) -> Filter {
        match (&self.source.filter_attribute, &self.source.filter_value) {
            (Some(attr), Some(value)) => Filter::equals(attr.clone(), value.clone()),
            _ => Filter::All,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            id_attribute: self.source.id_attribute.clone(),
            routing_attribute: self.source.routing_attribute.clone(),
            filter: self.filter(),
            page_size: self.source.page_size,
            batch_threshold: self.pipeline.batch_threshold,
            download_batch_size: self.pipeline.download_batch_size,
            concurrency: self.pipeline.concurrency,
            blob_prefix: self.blob.prefix.clone(),
            download_dir: self.state.download_dir.clone(),
            checkpoint_path: self.state.checkpoint.clone(),
            scan_retry: RetryPolicy {
                max_retries: self.source.max_retries,
                ..defaults.scan_retry
            },
            blob_retry: RetryPolicy {
                max_retries: self.blob.max_retries,
                ..defaults.blob_retry
            },
            preferred_domains: self.identity.preferred_domains.clone(),
        }
    }

    pub fn enrich_config(&self) -> EnrichConfig {
        let defaults = EnrichConfig::default();
        EnrichConfig {
            batch_size: self.enrich.batch_size,
            requests_per_sec: self.enrich.requests_per_sec,
            retry: RetryPolicy {
                max_retries: self.enrich.max_retries,
                ..defaults.retry
            },
        }
    }

    pub fn sink_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.warehouse.max_retries,
            ..RetryPolicy::sink()
        }
    }

    pub fn blob_read_timeout(&self) -> Duration {
        Duration::from_secs(self.blob.read_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.batch_threshold, 100);
        assert_eq!(config.enrich.batch_size, 250);
        assert_eq!(config.blob.prefix, "AnalysisOutput/");
        assert!(matches!(config.filter(), Filter::All));
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("RECITER_TEST_VAR", "test_value");
        assert_eq!(
            expand_env_var("${RECITER_TEST_VAR}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("RECITER_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[source]
analysis = "/srv/export/analysis.jsonl"
filter_attribute = "usingS3"
filter_value = "1"

[blob]
url = "https://bucket.example.org"
prefix = "Out/"

[pipeline]
concurrency = 8

[enrich]
max_retries = 3
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.source.analysis, PathBuf::from("/srv/export/analysis.jsonl"));
        assert_eq!(config.blob.url.as_deref(), Some("https://bucket.example.org"));

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.concurrency, 8);
        assert_eq!(pipeline.second_pass_concurrency(), 4);
        assert_eq!(pipeline.object_key("abc1001"), "Out/abc1001");
        assert!(matches!(pipeline.filter, Filter::Equals { .. }));
        // unset sections keep their defaults
        assert_eq!(pipeline.batch_threshold, 100);
        assert_eq!(config.enrich_config().retry.max_retries, 3);
        assert_eq!(config.enrich_config().batch_size, 250);
    }
}
