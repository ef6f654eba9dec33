//! Citation-metrics enrichment of accepted articles
//!
//! Accepted PMIDs are read back from the warehouse, sent to a
//! [`CitationSource`] in throttled batches, and the resulting metrics and
//! citation edges replace the `analysis_nih*` tables through a staging swap.
//! A batch that fails for good leaves all three tables as they were.

use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use reciter_core::{TokenBucket, is_shutdown_requested, retry_with_backoff};
use reciter_load::{LoadReport, Loader, RelationalSink};
use reciter_transform::{RowSet, Scalar, Table, TransformError};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::EnrichConfig;

#[derive(Debug)]
pub enum CitationError {
    /// Collaborator asked us to slow down
    Throttled,
    /// Network or server-side failure
    Unavailable(String),
    /// Response could not be decoded
    Invalid(String),
}

impl CitationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CitationError::Throttled | CitationError::Unavailable(_))
    }
}

impl fmt::Display for CitationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationError::Throttled => write!(f, "rate limited"),
            CitationError::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            CitationError::Invalid(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for CitationError {}

/// Metrics for one publication as returned by the collaborator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CitationRecord {
    pub pmid: Scalar,
    pub year: Scalar,
    pub is_research_article: Scalar,
    pub is_clinical: Scalar,
    pub relative_citation_ratio: Scalar,
    pub nih_percentile: Scalar,
    pub citation_count: Scalar,
    pub citations_per_year: Scalar,
    pub expected_citations_per_year: Scalar,
    pub field_citation_rate: Scalar,
    pub provisional: Scalar,
    pub doi: Scalar,
    pub human: Scalar,
    pub animal: Scalar,
    pub molecular_cellular: Scalar,
    pub apt: Scalar,
    pub x_coord: Scalar,
    pub y_coord: Scalar,
    #[serde(deserialize_with = "pmid_list")]
    pub cited_by: Vec<String>,
    #[serde(deserialize_with = "pmid_list")]
    pub references: Vec<String>,
    #[serde(deserialize_with = "pmid_list")]
    pub cited_by_clin: Vec<String>,
}

/// Accepts a list of numbers/strings, a single value, or null.
fn pmid_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let items = match Value::deserialize(d)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    };
    Ok(items
        .into_iter()
        .filter_map(|v| Scalar::new(v).text())
        .collect())
}

/// The external citation-metrics service.
pub trait CitationSource {
    fn fetch(&self, pmids: &[String]) -> Result<Vec<CitationRecord>, CitationError>;
}

impl<C: CitationSource + ?Sized> CitationSource for &C {
    fn fetch(&self, pmids: &[String]) -> Result<Vec<CitationRecord>, CitationError> {
        (**self).fetch(pmids)
    }
}

/// Citation records from a newline-delimited JSON export, keyed by PMID.
#[derive(Debug, Default)]
pub struct JsonlCitationSource {
    records: FxHashMap<String, CitationRecord>,
}

impl JsonlCitationSource {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        let mut records = FxHashMap::default();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("cannot read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CitationRecord>(&line) {
                Ok(r) => match r.pmid.text() {
                    Some(pmid) => {
                        records.insert(pmid, r);
                    }
                    None => log::warn!("{}:{}: record without pmid", path.display(), i + 1),
                },
                Err(e) => log::warn!("{}:{}: {e}", path.display(), i + 1),
            }
        }
        log::info!("{}: {} citation records", path.display(), records.len());
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CitationSource for JsonlCitationSource {
    fn fetch(&self, pmids: &[String]) -> Result<Vec<CitationRecord>, CitationError> {
        Ok(pmids
            .iter()
            .filter_map(|p| self.records.get(p).cloned())
            .collect())
    }
}

/// Row sets of the three enrichment tables.
pub struct CitationRows {
    pub nih: RowSet,
    pub cites: RowSet,
    pub clin: RowSet,
}

impl Default for CitationRows {
    fn default() -> Self {
        Self {
            nih: RowSet::for_table(Table::AnalysisNih),
            cites: RowSet::for_table(Table::AnalysisNihCites),
            clin: RowSet::for_table(Table::AnalysisNihCitesClin),
        }
    }
}

impl CitationRows {
    /// Metrics row plus one edge per cited-by, reference and clinical
    /// cited-by PMID. Records without a PMID are skipped.
    pub fn push(&mut self, record: &CitationRecord) -> Result<bool, TransformError> {
        let Some(pmid) = record.pmid.text() else {
            log::warn!("skipping citation record without pmid");
            return Ok(false);
        };
        let metrics = [
            &record.year,
            &record.is_research_article,
            &record.is_clinical,
            &record.relative_citation_ratio,
            &record.nih_percentile,
            &record.citation_count,
            &record.citations_per_year,
            &record.expected_citations_per_year,
            &record.field_citation_rate,
            &record.provisional,
            &record.doi,
            &record.human,
            &record.animal,
            &record.molecular_cellular,
            &record.apt,
            &record.x_coord,
            &record.y_coord,
        ];
        let mut row = Vec::with_capacity(metrics.len() + 1);
        row.push(pmid.clone());
        row.extend(metrics.iter().map(|s| s.render()));
        self.nih.push(row)?;

        for other in record.cited_by.iter().chain(&record.references) {
            self.cites.push(vec![other.clone(), pmid.clone()])?;
        }
        for other in &record.cited_by_clin {
            self.clin.push(vec![other.clone(), pmid.clone()])?;
        }
        Ok(true)
    }

    pub fn into_sets(self) -> [RowSet; 3] {
        [self.nih, self.cites, self.clin]
    }
}

#[derive(Debug, Default)]
pub struct EnrichSummary {
    pub pmids: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub records: usize,
    pub report: LoadReport,
    /// Stopped by a shutdown request; nothing was swapped in
    pub interrupted: bool,
    /// Swap skipped because some batches failed
    pub kept_previous: bool,
}

impl EnrichSummary {
    pub fn log(&self) {
        log::info!(
            "enrichment: {} pmids, {} batches ({} failed), {} records, {} rows",
            self.pmids,
            self.batches,
            self.failed_batches,
            self.records,
            self.report.rows_loaded()
        );
        for (table, err) in self.report.failed() {
            log::error!("{table}: {err}");
        }
        if self.kept_previous {
            log::warn!("citation tables left unchanged");
        }
    }

    pub fn exit_status(&self) -> u8 {
        if self.interrupted {
            130
        } else if self.failed_batches > 0 || self.report.has_failures() {
            1
        } else {
            0
        }
    }
}

/// Enrich every accepted article and swap the results in.
pub fn enrich<S, C>(
    source: &C,
    bucket: &TokenBucket,
    loader: &mut Loader<S>,
    config: &EnrichConfig,
) -> anyhow::Result<EnrichSummary>
where
    S: RelationalSink,
    C: CitationSource + ?Sized,
{
    let pmids = loader
        .accepted_pmids()
        .context("cannot read accepted pmids")?;
    let mut summary = EnrichSummary {
        pmids: pmids.len(),
        ..Default::default()
    };
    if pmids.is_empty() {
        log::warn!("no accepted articles, nothing to enrich");
        return Ok(summary);
    }

    let mut rows = CitationRows::default();
    for (i, batch) in pmids.chunks(config.batch_size.max(1)).enumerate() {
        if is_shutdown_requested() {
            log::warn!("shutdown requested, abandoning enrichment");
            summary.interrupted = true;
            return Ok(summary);
        }
        summary.batches += 1;
        let label = format!("citation batch {}", i + 1);
        let result = retry_with_backoff(&label, &config.retry, CitationError::is_retryable, |_| {
            bucket.acquire();
            match source.fetch(batch)? {
                records if records.is_empty() => {
                    Err(CitationError::Unavailable("empty response".to_string()))
                }
                records => Ok(records),
            }
        });
        match result {
            Ok(records) => {
                log::debug!("{label}: {} records for {} pmids", records.len(), batch.len());
                for record in &records {
                    if rows.push(record)? {
                        summary.records += 1;
                    }
                }
            }
            Err(e) => {
                log::error!("{label}: skipped after retries: {e}");
                summary.failed_batches += 1;
            }
        }
    }

    if summary.failed_batches > 0 {
        log::error!(
            "{} of {} batches failed, keeping previous citation tables",
            summary.failed_batches,
            summary.batches
        );
        summary.kept_previous = true;
        return Ok(summary);
    }
    summary.report = loader.swap_reload(&rows.into_sets());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_record_decode() {
        let r: CitationRecord = serde_json::from_value(json!({
            "pmid": 123,
            "year": "2020",
            "cited_by": [456, "789"],
            "references": null,
            "cited_by_clin": 111,
            "extra": "ignored"
        }))
        .unwrap();
        assert_eq!(r.pmid.render(), "123");
        assert_eq!(r.cited_by, vec!["456", "789"]);
        assert!(r.references.is_empty());
        assert_eq!(r.cited_by_clin, vec!["111"]);
    }

    #[test]
    fn edge_rows_pair_other_pmid_with_record_pmid() {
        let r: CitationRecord = serde_json::from_value(json!({
            "pmid": 100,
            "relative_citation_ratio": 1.5,
            "cited_by": [200],
            "references": [300, 301],
            "cited_by_clin": [400]
        }))
        .unwrap();
        let mut rows = CitationRows::default();
        assert!(rows.push(&r).unwrap());

        assert_eq!(rows.nih.len(), 1);
        assert_eq!(rows.nih.rows()[0][0], "100");
        assert_eq!(rows.nih.rows()[0][4], "1.5");
        assert_eq!(
            rows.cites.rows(),
            &[
                vec!["200".to_string(), "100".to_string()],
                vec!["300".to_string(), "100".to_string()],
                vec!["301".to_string(), "100".to_string()],
            ]
        );
        assert_eq!(rows.clin.rows(), &[vec!["400".to_string(), "100".to_string()]]);
    }

    #[test]
    fn record_without_pmid_is_skipped() {
        let mut rows = CitationRows::default();
        assert!(!rows.push(&CitationRecord::default()).unwrap());
        assert!(rows.nih.is_empty());
    }

    #[test]
    fn retryable_classes() {
        assert!(CitationError::Throttled.is_retryable());
        assert!(CitationError::Unavailable("503".into()).is_retryable());
        assert!(!CitationError::Invalid("bad json".into()).is_retryable());
    }
}
