//! End-to-end runs against in-memory sources, a fake blob store and an
//! in-memory DuckDB warehouse

use std::path::Path;
use std::sync::Mutex;

use reciter_core::{BlobError, BlobStore, MemorySource, ProgressContext, RetryPolicy, TokenBucket};
use reciter_load::{DuckDbSink, Loader, RelationalSink};
use reciter_pipeline::{
    CitationError, CitationRecord, CitationSource, EnrichConfig, MISSING_ID, PipelineConfig,
    RunMode, Sources, enrich, run,
};
use reciter_transform::Table;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tempfile::TempDir;

struct Object {
    body: String,
    /// Downloads that fail before one succeeds
    failures: u32,
    attempts: u32,
}

/// Blob store whose objects can be told to fail a number of times.
#[derive(Default)]
struct FakeBlobs {
    objects: Mutex<FxHashMap<String, Object>>,
}

impl FakeBlobs {
    fn put(&self, key: &str, body: &Value, failures: u32) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            Object {
                body: body.to_string(),
                failures,
                attempts: 0,
            },
        );
    }

    fn attempts(&self, key: &str) -> u32 {
        self.objects.lock().unwrap().get(key).map_or(0, |o| o.attempts)
    }

    fn total_attempts(&self) -> u32 {
        self.objects.lock().unwrap().values().map(|o| o.attempts).sum()
    }
}

impl BlobStore for FakeBlobs {
    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    fn download(&self, key: &str, dest: &Path) -> Result<u64, BlobError> {
        let mut objects = self.objects.lock().unwrap();
        let obj = objects
            .get_mut(key)
            .ok_or_else(|| BlobError::NotFound(key.to_string()))?;
        obj.attempts += 1;
        if obj.failures > 0 {
            obj.failures -= 1;
            return Err(BlobError::Http {
                status: Some(503),
                message: "slow down".into(),
            });
        }
        std::fs::write(dest, &obj.body)?;
        Ok(obj.body.len() as u64)
    }
}

fn feature(id: &str, pmid: u64) -> Value {
    json!({
        "personIdentifier": id,
        "dateAdded": 1704164645678_i64,
        "precision": 0.5,
        "reCiterArticleFeatures": [{"pmid": pmid, "userAssertion": "ACCEPTED"}]
    })
}

fn inline(id: &str, pmid: u64) -> Value {
    json!({"uid": id, "usingS3": 0, "reCiterFeature": feature(id, pmid)})
}

fn external(id: &str) -> Value {
    json!({"uid": id, "usingS3": 1})
}

fn config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        download_dir: dir.path().join("downloads"),
        checkpoint_path: dir.path().join("checkpoint.json"),
        scan_retry: RetryPolicy::immediate(1),
        blob_retry: RetryPolicy::immediate(0),
        ..Default::default()
    }
}

fn loader(dir: &TempDir) -> Loader<DuckDbSink> {
    let mut loader = Loader::new(DuckDbSink::in_memory().unwrap(), dir.path().join("staging"))
        .unwrap()
        .with_retry(RetryPolicy::immediate(1));
    loader.ensure_schema().unwrap();
    loader
}

#[test]
fn mixed_scan_flushes_by_class() {
    let dir = TempDir::new().unwrap();
    let blobs = FakeBlobs::default();
    let mut items = Vec::new();
    for i in 0..250 {
        // 3 inline, 2 external per group of 5
        if i % 5 < 3 {
            items.push(inline(&format!("in{i}"), 1000 + i));
        } else {
            let id = format!("ex{i}");
            blobs.put(&format!("AnalysisOutput/{id}"), &feature(&id, 1000 + i), 0);
            items.push(external(&id));
        }
    }
    let source = MemorySource::new(items);
    let mut loader = loader(&dir);
    let summary = run(
        &config(&dir),
        RunMode::Incremental,
        &Sources {
            analysis: &source,
            identity: None,
            blobs: &blobs,
        },
        &mut loader,
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(summary.items, 250);
    assert_eq!(summary.inline_flushes, 2);
    assert_eq!(summary.external_flushes, 1);
    assert_eq!(summary.objects_fetched, 100);
    assert_eq!(blobs.total_attempts(), 100);
    assert_eq!(summary.exit_status(), 0);
    assert_eq!(loader.row_count(Table::Person).unwrap(), 250);
    assert_eq!(loader.row_count(Table::PersonArticle).unwrap(), 250);
    // scan completed, nothing to resume
    assert!(!dir.path().join("checkpoint.json").exists());
}

#[test]
fn second_pass_then_fallback() {
    let dir = TempDir::new().unwrap();
    let blobs = FakeBlobs::default();
    blobs.put("AnalysisOutput/ok", &feature("ok", 1), 0);
    blobs.put("AnalysisOutput/flaky", &feature("flaky", 2), 1);
    blobs.put("AnalysisOutput/down", &feature("down", 3), u32::MAX);

    let mut down = external("down");
    down["reCiterFeature"] = feature("down", 3);
    let source = MemorySource::new(vec![external("ok"), external("flaky"), down]);
    let mut loader = loader(&dir);
    let summary = run(
        &config(&dir),
        RunMode::Incremental,
        &Sources {
            analysis: &source,
            identity: None,
            blobs: &blobs,
        },
        &mut loader,
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(summary.deferred, 2);
    assert_eq!(summary.second_pass_recovered, 1);
    assert_eq!(summary.fallback_recovered, 1);
    assert!(summary.unrecoverable.is_empty());
    // first pass + exactly one second pass
    assert_eq!(blobs.attempts("AnalysisOutput/flaky"), 2);
    assert_eq!(blobs.attempts("AnalysisOutput/down"), 2);
    assert_eq!(blobs.attempts("AnalysisOutput/ok"), 1);
    assert_eq!(loader.row_count(Table::Person).unwrap(), 3);
}

#[test]
fn unlisted_objects_use_source_record() {
    let dir = TempDir::new().unwrap();
    let blobs = FakeBlobs::default();
    let mut embedded = external("embedded");
    embedded["reCiterFeature"] = feature("embedded", 7);
    let source = MemorySource::new(vec![embedded, external("bare"), json!({"usingS3": 1})]);

    let mut loader = loader(&dir);
    let summary = run(
        &config(&dir),
        RunMode::Incremental,
        &Sources {
            analysis: &source,
            identity: None,
            blobs: &blobs,
        },
        &mut loader,
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(blobs.total_attempts(), 0);
    assert_eq!(summary.fallback_recovered, 1);
    assert_eq!(
        summary.unrecoverable,
        vec![MISSING_ID.to_string(), "bare".to_string()]
    );
    assert_eq!(summary.exit_status(), 1);
    assert_eq!(loader.row_count(Table::Person).unwrap(), 1);
}

#[test]
fn full_run_loads_identity_and_master_attributes() {
    let dir = TempDir::new().unwrap();
    let blobs = FakeBlobs::default();
    let identity = MemorySource::new(vec![json!({
        "uid": "abc1001",
        "identity": {
            "primaryName": {"firstName": "Jane", "lastName": "Doe"},
            "emails": ["jad1001@med.cornell.edu"],
            "personTypes": ["academic"]
        }
    })]);
    let analysis = MemorySource::new(vec![inline("abc1001", 42)]);

    let config = config(&dir);
    std::fs::write(&config.checkpoint_path, r#"{"LastEvaluatedKey":"1"}"#).unwrap();
    let mut loader = loader(&dir);
    let summary = run(
        &config,
        RunMode::Full,
        &Sources {
            analysis: &analysis,
            identity: Some(&identity),
            blobs: &blobs,
        },
        &mut loader,
        &ProgressContext::hidden(),
    )
    .unwrap();

    // stale checkpoint was cleared, the whole table was scanned
    assert_eq!(summary.items, 1);
    assert_eq!(summary.identity_people, Some(1));
    assert_eq!(loader.row_count(Table::PersonPersonType).unwrap(), 1);
    let names = loader
        .sink_mut()
        .query_strings("SELECT \"firstName\" FROM person")
        .unwrap();
    assert_eq!(names, vec!["Jane"]);
}

#[test]
fn full_run_refuses_empty_identity() {
    let dir = TempDir::new().unwrap();
    let blobs = FakeBlobs::default();
    let identity = MemorySource::new(Vec::new());
    let analysis = MemorySource::new(vec![inline("abc1001", 42)]);
    let mut loader = loader(&dir);

    let err = run(
        &config(&dir),
        RunMode::Full,
        &Sources {
            analysis: &analysis,
            identity: Some(&identity),
            blobs: &blobs,
        },
        &mut loader,
        &ProgressContext::hidden(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("no people"));
}

/// Citation collaborator answering from a fixed map. Batches that contain
/// a `failing` PMID get a non-retryable error.
struct FakeCitations {
    records: FxHashMap<String, Value>,
    failing: Vec<String>,
    calls: Mutex<usize>,
}

impl FakeCitations {
    fn new(records: Vec<Value>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r["pmid"].to_string(), r))
                .collect(),
            failing: Vec::new(),
            calls: Mutex::new(0),
        }
    }

    fn failing_on(mut self, pmids: &[&str]) -> Self {
        self.failing = pmids.iter().map(|p| p.to_string()).collect();
        self
    }
}

impl CitationSource for FakeCitations {
    fn fetch(&self, pmids: &[String]) -> Result<Vec<CitationRecord>, CitationError> {
        *self.calls.lock().unwrap() += 1;
        if pmids.iter().any(|p| self.failing.contains(p)) {
            return Err(CitationError::Invalid("bad payload".into()));
        }
        pmids
            .iter()
            .filter_map(|p| self.records.get(p))
            .map(|r| {
                serde_json::from_value(r.clone()).map_err(|e| CitationError::Invalid(e.to_string()))
            })
            .collect()
    }
}

fn enrich_config() -> EnrichConfig {
    EnrichConfig {
        batch_size: 2,
        requests_per_sec: 100,
        retry: RetryPolicy::immediate(2),
    }
}

fn warehouse_with_articles(dir: &TempDir) -> Loader<DuckDbSink> {
    let blobs = FakeBlobs::default();
    let source = MemorySource::new(vec![
        inline("a1", 100),
        inline("a2", 200),
        inline("a3", 300),
    ]);
    let mut loader = loader(dir);
    run(
        &config(dir),
        RunMode::Incremental,
        &Sources {
            analysis: &source,
            identity: None,
            blobs: &blobs,
        },
        &mut loader,
        &ProgressContext::hidden(),
    )
    .unwrap();
    loader
}

#[test]
fn enrichment_swaps_in_metrics_and_edges() {
    let dir = TempDir::new().unwrap();
    let mut loader = warehouse_with_articles(&dir);
    let source = FakeCitations::new(vec![
        json!({"pmid": 100, "relative_citation_ratio": 2.5, "cited_by": [200], "references": [50]}),
        json!({"pmid": 200, "cited_by_clin": [900]}),
        json!({"pmid": 300}),
    ]);
    let bucket = TokenBucket::per_second(100);

    let summary = enrich(&source, &bucket, &mut loader, &enrich_config()).unwrap();
    assert_eq!(summary.pmids, 3);
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.exit_status(), 0);
    assert_eq!(*source.calls.lock().unwrap(), 2);
    assert_eq!(loader.row_count(Table::AnalysisNih).unwrap(), 3);
    assert_eq!(loader.row_count(Table::AnalysisNihCites).unwrap(), 2);
    assert_eq!(loader.row_count(Table::AnalysisNihCitesClin).unwrap(), 1);
}

#[test]
fn failed_enrichment_keeps_previous_content() {
    let dir = TempDir::new().unwrap();
    let mut loader = warehouse_with_articles(&dir);
    let bucket = TokenBucket::per_second(100);
    let good = FakeCitations::new(vec![
        json!({"pmid": 100, "cited_by": [200]}),
        json!({"pmid": 200}),
        json!({"pmid": 300}),
    ]);
    let summary = enrich(&good, &bucket, &mut loader, &enrich_config()).unwrap();
    assert_eq!(summary.exit_status(), 0);
    assert_eq!(loader.row_count(Table::AnalysisNih).unwrap(), 3);

    // first batch (100, 200) succeeds, second (300) fails
    let partial = FakeCitations::new(vec![
        json!({"pmid": 100, "cited_by": [200, 300], "references": [50]}),
        json!({"pmid": 200}),
        json!({"pmid": 300}),
    ])
    .failing_on(&["300"]);
    let summary = enrich(&partial, &bucket, &mut loader, &enrich_config()).unwrap();

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.failed_batches, 1);
    assert!(summary.kept_previous);
    assert_eq!(summary.exit_status(), 1);
    // non-retryable: one call per batch
    assert_eq!(*partial.calls.lock().unwrap(), 2);
    assert_eq!(summary.report.outcome("analysis_nih"), None);
    assert_eq!(loader.row_count(Table::AnalysisNih).unwrap(), 3);
    assert_eq!(loader.row_count(Table::AnalysisNihCites).unwrap(), 1);
}

#[test]
fn empty_citation_response_is_retried() {
    let dir = TempDir::new().unwrap();
    let mut loader = warehouse_with_articles(&dir);
    let bucket = TokenBucket::per_second(100);
    // nothing known for 300
    let source = FakeCitations::new(vec![json!({"pmid": 100}), json!({"pmid": 200})]);

    let summary = enrich(&source, &bucket, &mut loader, &enrich_config()).unwrap();
    assert_eq!(summary.failed_batches, 1);
    assert!(summary.kept_previous);
    // one call for the first batch, 1 + 2 retries for the second
    assert_eq!(*source.calls.lock().unwrap(), 4);
    assert_eq!(loader.row_count(Table::AnalysisNih).unwrap(), 0);
}
