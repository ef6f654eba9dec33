//! Secondary-object fetcher: bounded-concurrency blob downloads
//!
//! A dedicated rayon pool with exactly `concurrency` threads pulls keys from
//! a [`WorkQueue`]. Each worker downloads one object (with retry), decodes
//! it and deletes the local file before claiming the next key, so at most
//! `concurrency` objects sit on disk at any time.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flate2::read::GzDecoder;
use indicatif::ProgressBar;
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::blob::BlobStore;
use crate::error::FetchError;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::work_queue::WorkQueue;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One downloaded and decoded object.
#[derive(Debug)]
pub struct FetchedObject {
    pub key: String,
    pub records: Vec<Value>,
    pub bytes: u64,
}

#[derive(Debug)]
pub struct FailedFetch {
    pub key: String,
    pub error: FetchError,
}

/// Success/failure partition of one `fetch` call; order is not meaningful.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub succeeded: Vec<FetchedObject>,
    pub failed: Vec<FailedFetch>,
}

impl FetchOutcome {
    pub fn failed_keys(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.key.clone()).collect()
    }

    pub fn bytes(&self) -> u64 {
        self.succeeded.iter().map(|o| o.bytes).sum()
    }
}

pub struct Fetcher<'a, B: ?Sized> {
    store: &'a B,
    download_dir: PathBuf,
    retry: RetryPolicy,
    progress: Option<ProgressBar>,
}

impl<'a, B: BlobStore + ?Sized> Fetcher<'a, B> {
    pub fn new(store: &'a B, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            download_dir: download_dir.into(),
            retry: RetryPolicy::blob(),
            progress: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ticked once per finished key, success or failure.
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    /// Download, decode and delete every key using `concurrency` workers.
    ///
    /// Duplicate keys are fetched once. Errors here are pool/setup errors;
    /// per-key failures land in [`FetchOutcome::failed`].
    pub fn fetch(&self, keys: &[String], concurrency: usize) -> io::Result<FetchOutcome> {
        if keys.is_empty() {
            return Ok(FetchOutcome::default());
        }
        std::fs::create_dir_all(&self.download_dir)?;

        let mut seen = FxHashSet::default();
        let unique: Vec<&String> = keys.iter().filter(|k| seen.insert(k.as_str())).collect();

        let workers = concurrency.clamp(1, unique.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fetch-{i}"))
            .build()
            .map_err(io::Error::other)?;

        let queue = WorkQueue::new(unique);
        let succeeded = Mutex::new(Vec::with_capacity(queue.total()));
        let failed = Mutex::new(Vec::new());

        pool.install(|| {
            rayon::scope(|s| {
                for _ in 0..workers {
                    s.spawn(|_| {
                        while let Some(key) = queue.next() {
                            match self.fetch_one(key) {
                                Ok(obj) => succeeded.lock().expect("fetch results poisoned").push(obj),
                                Err(error) => {
                                    log::warn!("{key}: {error}");
                                    failed.lock().expect("fetch results poisoned").push(FailedFetch {
                                        key: key.to_string(),
                                        error,
                                    });
                                }
                            }
                            if let Some(pb) = &self.progress {
                                pb.inc(1);
                            }
                        }
                    });
                }
            });
        });

        let outcome = FetchOutcome {
            succeeded: succeeded.into_inner().expect("fetch results poisoned"),
            failed: failed.into_inner().expect("fetch results poisoned"),
        };
        log::debug!(
            "fetched {}/{} objects ({} failed, {} bytes) with {workers} workers",
            outcome.succeeded.len(),
            queue.total(),
            outcome.failed.len(),
            outcome.bytes()
        );
        Ok(outcome)
    }

    fn fetch_one(&self, key: &str) -> Result<FetchedObject, FetchError> {
        let local = self.download_dir.join(local_name(key));
        let downloaded = retry_with_backoff(
            key,
            &self.retry,
            |e: &FetchError| e.is_retryable(),
            |_| self.store.download(key, &local).map_err(FetchError::from),
        );
        let bytes = match downloaded {
            Ok(n) => n,
            Err(e) => {
                remove_quietly(&local);
                return Err(e);
            }
        };
        let records = read_records(&local);
        remove_quietly(&local);
        Ok(FetchedObject {
            key: key.to_string(),
            records: records?,
            bytes,
        })
    }
}

fn local_name(key: &str) -> String {
    key.replace(['/', '\\'], "_")
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("could not delete {}: {e}", path.display()),
    }
}

/// Decode a downloaded object into records.
///
/// Accepts a JSON array, a single JSON document, or newline-delimited JSON,
/// any of them optionally gzip-compressed. Undecodable NDJSON lines are
/// logged and skipped; an object yielding nothing but bad lines is an error.
pub fn read_records(path: &Path) -> Result<Vec<Value>, FetchError> {
    let raw = std::fs::read(path)?;
    let bytes = if raw.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::with_capacity(raw.len() * 4);
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut out)
            .map_err(|e| FetchError::Decode(format!("gzip: {e}")))?;
        out
    } else {
        raw
    };
    let text = std::str::from_utf8(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if let Ok(doc) = serde_json::from_str::<Value>(trimmed) {
        return Ok(match doc {
            Value::Array(items) => items,
            other => vec![other],
        });
    }

    let mut records = Vec::new();
    let mut bad = 0usize;
    for (lineno, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(v) => records.push(v),
            Err(e) => {
                bad += 1;
                log::warn!("{}:{}: skipping undecodable line: {e}", path.display(), lineno + 1);
            }
        }
    }
    if records.is_empty() && bad > 0 {
        return Err(FetchError::Decode(format!("{bad} undecodable lines, no records")));
    }
    Ok(records)
}
