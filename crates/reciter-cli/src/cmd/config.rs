//! Config subcommand - print the effective configuration

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

pub fn run(config: &Config) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let filter = match (&config.source.filter_attribute, &config.source.filter_value) {
        (Some(a), Some(v)) => format!("{a} = {v}"),
        _ => "all items".to_string(),
    };
    table.add_row(vec!["Analysis source", &config.source.analysis.display().to_string()]);
    table.add_row(vec!["Identity source", &config.source.identity.display().to_string()]);
    table.add_row(vec!["Scan filter", &filter]);
    table.add_row(vec!["Page size", &config.source.page_size.to_string()]);
    table.add_row(vec![
        "Blob store",
        &match &config.blob.url {
            Some(url) => url.clone(),
            None => config.blob.root.display().to_string(),
        },
    ]);
    table.add_row(vec!["Blob prefix", &config.blob.prefix]);
    table.add_row(vec![
        "Batch threshold",
        &config.pipeline.batch_threshold.to_string(),
    ]);
    table.add_row(vec![
        "Download batch",
        &config.pipeline.download_batch_size.to_string(),
    ]);
    table.add_row(vec![
        "Workers",
        &format!(
            "{} (second pass: {})",
            config.pipeline.concurrency,
            (config.pipeline.concurrency / 2).max(1)
        ),
    ]);
    table.add_row(vec!["Warehouse", &config.warehouse.path.display().to_string()]);
    table.add_row(vec!["Checkpoint", &config.state.checkpoint.display().to_string()]);
    table.add_row(vec!["Staging dir", &config.state.staging_dir.display().to_string()]);
    table.add_row(vec![
        "Preferred domains",
        &config.identity.preferred_domains.join(", "),
    ]);
    table.add_row(vec![
        "Enrichment",
        &format!(
            "{} ({} per batch, {}/s)",
            config.enrich.citations.display(),
            config.enrich.batch_size,
            config.enrich.requests_per_sec
        ),
    ]);

    eprintln!("\n{table}");
}
