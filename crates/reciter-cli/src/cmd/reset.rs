//! Reset subcommand - forget the scan position

use anyhow::{Context, Result};
use reciter_core::CheckpointStore;

use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let store = CheckpointStore::new(&config.state.checkpoint);
    match store.load() {
        Ok(Some(cursor)) => log::info!("Discarding checkpoint at {cursor}"),
        Ok(None) => {}
        // a corrupt file is exactly what reset is for
        Err(e) => log::warn!("{e}"),
    }
    store
        .clear()
        .with_context(|| format!("Failed to remove {}", store.path().display()))?;
    eprintln!("Checkpoint cleared; the next run scans from the beginning");
    Ok(())
}
