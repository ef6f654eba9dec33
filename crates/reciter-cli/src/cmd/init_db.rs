//! Init-db subcommand - create the warehouse schema

use anyhow::Result;

use crate::cmd::open_loader;
use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    open_loader(config)?;
    eprintln!("Schema ready in {}", config.warehouse.path.display());
    Ok(())
}
