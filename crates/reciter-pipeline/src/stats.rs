//! Run summary: counters collected over one pipeline run

use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use reciter_core::fmt_num;

use crate::runner::RunMode;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: RunMode,
    /// People loaded into the master table (full runs)
    pub identity_people: Option<usize>,
    pub pages: usize,
    pub items: usize,
    pub inline_flushes: usize,
    pub external_flushes: usize,
    pub objects_fetched: usize,
    pub bytes_fetched: u64,
    pub deferred: usize,
    pub second_pass_recovered: usize,
    pub fallback_recovered: usize,
    pub unrecoverable: Vec<String>,
    pub graphs: usize,
    /// Source items without a usable identifier
    pub items_skipped: usize,
    pub articles: usize,
    pub articles_skipped: usize,
    pub articles_rejected: usize,
    pub rows_loaded: usize,
    pub failed_tables: Vec<(String, String)>,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            identity_people: None,
            pages: 0,
            items: 0,
            inline_flushes: 0,
            external_flushes: 0,
            objects_fetched: 0,
            bytes_fetched: 0,
            deferred: 0,
            second_pass_recovered: 0,
            fallback_recovered: 0,
            unrecoverable: Vec::new(),
            graphs: 0,
            items_skipped: 0,
            articles: 0,
            articles_skipped: 0,
            articles_rejected: 0,
            rows_loaded: 0,
            failed_tables: Vec::new(),
            interrupted: false,
            elapsed: Duration::ZERO,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_tables.is_empty() || !self.unrecoverable.is_empty()
    }

    /// `130` interrupted, `1` any failed table or unrecoverable subject,
    /// `0` otherwise.
    pub fn exit_status(&self) -> u8 {
        if self.interrupted {
            130
        } else if self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new(format!("{} run", self.mode))
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        let mut row = |label: &str, value: String| {
            table.add_row(vec![Cell::new(label), Cell::new(value)]);
        };
        if let Some(n) = self.identity_people {
            row("People (identity)", fmt_num(n));
        }
        row("Pages", fmt_num(self.pages));
        row("Items", fmt_num(self.items));
        row(
            "Flushes",
            format!("{} inline / {} external", self.inline_flushes, self.external_flushes),
        );
        row(
            "Objects fetched",
            format!(
                "{} ({:.1} MB)",
                fmt_num(self.objects_fetched),
                self.bytes_fetched as f64 / 1_048_576.0
            ),
        );
        row(
            "Recovered",
            format!(
                "{} second pass / {} fallback (of {} deferred)",
                self.second_pass_recovered, self.fallback_recovered, self.deferred
            ),
        );
        row("Feature graphs", fmt_num(self.graphs));
        row("Articles", fmt_num(self.articles));
        row(
            "Skipped",
            format!(
                "{} items / {} articles / {} rejected",
                self.items_skipped, self.articles_skipped, self.articles_rejected
            ),
        );

        table.add_row(vec![
            Cell::new("Rows loaded").fg(Color::Green),
            Cell::new(fmt_num(self.rows_loaded)).fg(Color::Green),
        ]);
        if !self.unrecoverable.is_empty() {
            table.add_row(vec![
                Cell::new("Unrecoverable").fg(Color::Red),
                Cell::new(preview(&self.unrecoverable)).fg(Color::Red),
            ]);
        }
        for (t, err) in &self.failed_tables {
            table.add_row(vec![
                Cell::new(format!("Failed: {t}")).fg(Color::Red),
                Cell::new(err).fg(Color::Red),
            ]);
        }
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
        ]);

        format!("\n{table}")
    }

    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    /// Log summary lines (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "{} run: {} items in {} pages, {} rows loaded [{:.1}s]",
            self.mode,
            fmt_num(self.items),
            fmt_num(self.pages),
            fmt_num(self.rows_loaded),
            self.elapsed.as_secs_f64()
        );
        log::info!(
            "flushes: {} inline / {} external, {} objects fetched, recovered {} second pass / {} fallback",
            self.inline_flushes,
            self.external_flushes,
            self.objects_fetched,
            self.second_pass_recovered,
            self.fallback_recovered
        );
        if !self.unrecoverable.is_empty() {
            log::error!(
                "{} subjects unrecoverable: {}",
                self.unrecoverable.len(),
                preview(&self.unrecoverable)
            );
        }
        for (t, err) in &self.failed_tables {
            log::error!("{t}: {err}");
        }
        if self.interrupted {
            log::warn!("run interrupted, checkpoint kept at the in-flight page");
        }
    }
}

/// First few identifiers, then a count.
fn preview(ids: &[String]) -> String {
    const SHOWN: usize = 5;
    let mut out = ids
        .iter()
        .take(SHOWN)
        .map(|s| if s.is_empty() { "<no id>" } else { s.as_str() })
        .collect::<Vec<_>>()
        .join(", ");
    if ids.len() > SHOWN {
        out.push_str(&format!(" (+{} more)", ids.len() - SHOWN));
    }
    out
}
