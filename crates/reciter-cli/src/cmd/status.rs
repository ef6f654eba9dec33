//! Status subcommand - checkpoint position and warehouse row counts

use anyhow::Result;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use reciter_core::{CheckpointStore, fmt_num};
use reciter_transform::ALL;

use crate::cmd::open_loader;
use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let checkpoint = match CheckpointStore::new(&config.state.checkpoint).load() {
        Ok(Some(cursor)) => format!("resume at {cursor}"),
        Ok(None) => "none (next run starts from the beginning)".to_string(),
        Err(e) => format!("unreadable: {e}"),
    };

    let mut loader = open_loader(config)?;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Table").fg(Color::Cyan),
            Cell::new("Rows").fg(Color::Cyan),
        ]);
    for t in ALL {
        let rows = match loader.row_count(t) {
            Ok(n) => Cell::new(fmt_num(n as usize)),
            Err(e) => Cell::new(e.to_string()).fg(Color::Red),
        };
        table.add_row(vec![Cell::new(t.name()), rows]);
    }

    eprintln!("Warehouse:  {}", config.warehouse.path.display());
    eprintln!("Checkpoint: {checkpoint}");
    eprintln!("\n{table}");
    Ok(())
}
