//! Bulk loader: staging file → one transaction per table

use std::fmt;
use std::io;
use std::path::PathBuf;

use reciter_core::{RetryPolicy, retry_with_backoff};
use reciter_transform::{ALL, CATALOG, RowSet, Table};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::sink::{RelationalSink, SinkError};
use crate::{sql, staging};

/// How a `load` call treats existing warehouse content.
#[derive(Debug, Clone)]
pub enum LoadMode {
    /// Truncate the catalog, load `reference` into `identity_temp`, load
    /// the tables, then copy master attributes onto `person`.
    Replace { reference: RowSet },
    /// Keep existing rows; supersede the rows of subjects being loaded.
    Append,
}

#[derive(Debug)]
pub enum LoadError {
    /// Pre/post step against the sink failed
    Sink(SinkError),
    /// Replace-mode reference table could not be loaded
    Reference(String),
    /// Staging directory unusable
    Io(io::Error),
}

impl LoadError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LoadError::Sink(e) => e.is_retryable(),
            LoadError::Reference(_) | LoadError::Io(_) => false,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Sink(e) => write!(f, "sink: {e}"),
            LoadError::Reference(msg) => write!(f, "reference load failed: {msg}"),
            LoadError::Io(e) => write!(f, "staging: {e}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Sink(e) => Some(e),
            LoadError::Io(e) => Some(e),
            LoadError::Reference(_) => None,
        }
    }
}

impl From<SinkError> for LoadError {
    fn from(e: SinkError) -> Self {
        LoadError::Sink(e)
    }
}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// What happened to one RowSet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    Loaded { rows: usize },
    /// No rows; no statement issued
    Empty,
    /// Same table already handled in this call
    Duplicate,
    /// Identical staging content already loaded in this run
    AlreadyLoaded,
    /// Not in the schema map
    Unknown,
    Failed(String),
}

#[derive(Debug, Default, Clone)]
pub struct LoadReport {
    pub tables: Vec<(String, TableOutcome)>,
}

impl LoadReport {
    pub fn rows_loaded(&self) -> usize {
        self.tables
            .iter()
            .map(|(_, o)| match o {
                TableOutcome::Loaded { rows } => *rows,
                _ => 0,
            })
            .sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tables.iter().filter_map(|(t, o)| match o {
            TableOutcome::Failed(msg) => Some((t.as_str(), msg.as_str())),
            _ => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|(t, _)| t == table).map(|(_, o)| o)
    }
}

/// Owns the sink connection for the whole run.
pub struct Loader<S> {
    sink: S,
    staging_dir: PathBuf,
    retry: RetryPolicy,
    manage_indexes: bool,
    /// table → staging digests loaded in this run
    digests: FxHashMap<&'static str, FxHashSet<String>>,
}

impl<S: RelationalSink> Loader<S> {
    pub fn new(sink: S, staging_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let staging_dir = staging_dir.into();
        std::fs::create_dir_all(&staging_dir)?;
        Ok(Self {
            sink,
            staging_dir,
            retry: RetryPolicy::sink(),
            manage_indexes: true,
            digests: FxHashMap::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Drop secondary indexes before a replace load and recreate them after.
    pub fn with_index_management(mut self, enabled: bool) -> Self {
        self.manage_indexes = enabled;
        self
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Create every table and index that does not exist yet.
    pub fn ensure_schema(&mut self) -> Result<(), LoadError> {
        let mut stmts: Vec<String> = ALL.iter().map(|t| sql::create_table(*t)).collect();
        stmts.extend(ALL.iter().filter_map(|t| sql::create_index(*t)));
        self.atomic("ensure schema", &stmts)?;
        log::debug!("schema ready ({} tables)", ALL.len());
        Ok(())
    }

    pub fn row_count(&mut self, table: Table) -> Result<u64, LoadError> {
        let query = sql::count_rows(table.name());
        let n = retry_with_backoff(
            &format!("count {table}"),
            &self.retry,
            SinkError::is_retryable,
            |attempt| {
                if attempt > 0 {
                    self.sink.reconnect()?;
                }
                self.sink.query_count(&query)
            },
        )?;
        Ok(n)
    }

    /// Distinct PMIDs of accepted articles.
    pub fn accepted_pmids(&mut self) -> Result<Vec<String>, LoadError> {
        let pmids = retry_with_backoff(
            "accepted pmids",
            &self.retry,
            SinkError::is_retryable,
            |attempt| {
                if attempt > 0 {
                    self.sink.reconnect()?;
                }
                self.sink.query_strings(sql::accepted_pmids())
            },
        )?;
        Ok(pmids)
    }

    /// Copy master attributes from `identity_temp` onto `person`.
    pub fn apply_master_attributes(&mut self) -> Result<(), LoadError> {
        self.atomic("master attributes", &[sql::apply_master_attributes()])?;
        log::info!("applied master attributes to person");
        Ok(())
    }

    /// Load `tables` in the given order.
    ///
    /// Per-table failures are recorded in the report and do not stop the
    /// remaining tables. Errors are returned only for replace-mode pre/post
    /// steps and the reference load.
    pub fn load(&mut self, tables: &[RowSet], mode: &LoadMode) -> Result<LoadReport, LoadError> {
        let append = matches!(mode, LoadMode::Append);
        let mut report = LoadReport::default();

        if let LoadMode::Replace { reference } = mode {
            self.replace_prelude()?;
            match self.load_one(reference, false) {
                TableOutcome::Failed(msg) => return Err(LoadError::Reference(msg)),
                outcome => report.tables.push((reference.table().to_string(), outcome)),
            }
        }

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for rows in tables {
            let outcome = if seen.insert(rows.table()) {
                self.load_one(rows, append)
            } else {
                log::debug!("{}: duplicate in this load, skipping", rows.table());
                TableOutcome::Duplicate
            };
            report.tables.push((rows.table().to_string(), outcome));
        }

        if matches!(mode, LoadMode::Replace { .. }) {
            self.apply_master_attributes()?;
            if self.manage_indexes {
                self.recreate_indexes()?;
            }
        }
        Ok(report)
    }

    /// Load each RowSet into `<table>_staging`, then replace the target's
    /// content in one transaction. Tables without rows keep their content.
    pub fn swap_reload(&mut self, tables: &[RowSet]) -> LoadReport {
        let mut report = LoadReport::default();
        for rows in tables {
            let outcome = self.swap_one(rows);
            report.tables.push((rows.table().to_string(), outcome));
        }
        report
    }

    fn swap_one(&mut self, rows: &RowSet) -> TableOutcome {
        let Some(table) = Table::from_name(rows.table()) else {
            log::warn!("{}: not in schema, skipping", rows.table());
            return TableOutcome::Unknown;
        };
        if rows.is_empty() {
            log::warn!("{table}: no rows produced, keeping previous content");
            return TableOutcome::Empty;
        }
        let staged = match staging::write(&self.staging_dir, rows) {
            Ok(s) => s,
            Err(e) => return self.fail(table, format!("staging: {e}")),
        };
        let staging_table = sql::staging_name(table.name());
        let fill = [
            sql::create_staging(table.name()),
            sql::insert_from_csv(&staging_table, rows.header(), &staged.path),
        ];
        if let Err(e) = self.atomic(&format!("stage {table}"), &fill) {
            return self.fail(table, e.to_string());
        }
        if let Err(e) = self.atomic(&format!("swap {table}"), &sql::swap_from_staging(table.name())) {
            return self.fail(table, e.to_string());
        }
        log::info!("{table}: swapped in {} rows", staged.rows);
        TableOutcome::Loaded { rows: staged.rows }
    }

    fn replace_prelude(&mut self) -> Result<(), LoadError> {
        if self.manage_indexes {
            let drops: Vec<String> = ALL.iter().filter_map(|t| sql::drop_index(*t)).collect();
            self.atomic("drop indexes", &drops)?;
        }
        let truncates: Vec<String> = CATALOG
            .iter()
            .chain(std::iter::once(&Table::IdentityTemp))
            .map(|t| sql::truncate(t.name()))
            .collect();
        self.atomic("truncate", &truncates)?;
        self.digests.clear();
        log::info!("truncated {} tables", truncates.len());
        Ok(())
    }

    fn recreate_indexes(&mut self) -> Result<(), LoadError> {
        let creates: Vec<String> = ALL.iter().filter_map(|t| sql::create_index(*t)).collect();
        self.atomic("create indexes", &creates)?;
        Ok(())
    }

    fn load_one(&mut self, rows: &RowSet, append: bool) -> TableOutcome {
        let Some(table) = Table::from_name(rows.table()) else {
            log::warn!("{}: not in schema, skipping", rows.table());
            return TableOutcome::Unknown;
        };

        let staged = match staging::write(&self.staging_dir, rows) {
            Ok(s) => s,
            Err(e) => return self.fail(table, format!("staging: {e}")),
        };
        if self
            .digests
            .get(table.name())
            .is_some_and(|d| d.contains(&staged.digest))
        {
            log::debug!("{table}: identical content already loaded, skipping");
            return TableOutcome::AlreadyLoaded;
        }
        if rows.is_empty() {
            log::debug!("{table}: no rows");
            return TableOutcome::Empty;
        }

        let mut stmts = Vec::with_capacity(2);
        if append {
            if let Some(key) = table.subject_key() {
                stmts.push(sql::supersede(table.name(), key, &staged.path));
            }
        }
        stmts.push(sql::insert_from_csv(table.name(), rows.header(), &staged.path));

        match self.atomic(&format!("load {table}"), &stmts) {
            Ok(()) => {
                self.digests
                    .entry(table.name())
                    .or_default()
                    .insert(staged.digest);
                log::info!("{table}: loaded {} rows", staged.rows);
                TableOutcome::Loaded { rows: staged.rows }
            }
            Err(e) => self.fail(table, e.to_string()),
        }
    }

    fn fail(&self, table: Table, msg: String) -> TableOutcome {
        log::error!("{table}: load failed: {msg}");
        TableOutcome::Failed(msg)
    }

    /// One unit of work, reconnecting before every retry.
    fn atomic(&mut self, label: &str, stmts: &[String]) -> Result<(), SinkError> {
        if stmts.is_empty() {
            return Ok(());
        }
        let sink = &mut self.sink;
        retry_with_backoff(label, &self.retry, SinkError::is_retryable, |attempt| {
            if attempt > 0 {
                sink.reconnect()?;
            }
            sink.execute_atomic(stmts)
        })
    }
}
