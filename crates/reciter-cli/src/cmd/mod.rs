//! Subcommand implementations and the warehouse/collaborator wiring they share

pub mod config;
pub mod enrich;
pub mod init_db;
pub mod reset;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use reciter_core::{BlobStore, HttpBlobStore, LocalBlobStore};
use reciter_load::{DuckDbSink, DuckDbTarget, Loader};

use crate::config::Config;

/// Open the warehouse and make sure every table exists.
pub fn open_loader(config: &Config) -> Result<Loader<DuckDbSink>> {
    let path = &config.warehouse.path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let sink = DuckDbSink::open(DuckDbTarget::File(path.clone()))
        .with_context(|| format!("Failed to open warehouse {}", path.display()))?;
    let mut loader = Loader::new(sink, &config.state.staging_dir)
        .with_context(|| format!("Failed to create {}", config.state.staging_dir.display()))?
        .with_retry(config.sink_retry())
        .with_index_management(config.warehouse.manage_indexes);
    loader.ensure_schema().context("Failed to create schema")?;
    Ok(loader)
}

/// HTTP bucket when a URL is configured, local directory otherwise.
pub fn blob_store(config: &Config) -> Box<dyn BlobStore> {
    match &config.blob.url {
        Some(url) => {
            log::info!("Blob store: {url}");
            Box::new(HttpBlobStore::new(url.clone()).with_read_timeout(config.blob_read_timeout()))
        }
        None => {
            log::info!("Blob store: {}", config.blob.root.display());
            Box::new(LocalBlobStore::new(config.blob.root.clone()))
        }
    }
}
