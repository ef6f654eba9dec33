//! Paginated scanner: resumable page-by-page walk of a key-value source
//!
//! The continuation cursor of page N is written to the checkpoint when the
//! caller asks for page N+1, i.e. once page N has been handed off. The
//! checkpoint is cleared when the caller observes the end of the scan. After
//! a crash the scan therefore resumes at the page that was in flight.

use std::fmt;
use std::io;

use serde_json::Value;

use crate::checkpoint::{CheckpointStore, Cursor};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::source::{Filter, KeyValueSource, SourceError};

#[derive(Debug)]
pub enum ScanError {
    /// Source still failing after the retry budget (or not retryable)
    Source(SourceError),
    /// Checkpoint could not be persisted
    Checkpoint(io::Error),
}

impl ScanError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ScanError::Source(e) => e.is_retryable(),
            ScanError::Checkpoint(_) => false,
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Source(e) => write!(f, "scan failed: {e}"),
            ScanError::Checkpoint(e) => write!(f, "checkpoint write failed: {e}"),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Source(e) => Some(e),
            ScanError::Checkpoint(e) => Some(e),
        }
    }
}

/// Counters for the run summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Source requests answered (including empty pages)
    pub pages: usize,
    /// Items yielded after filtering
    pub items: usize,
}

enum Pending {
    /// Nothing handed out yet
    None,
    /// Persist this cursor before the next request
    Advance(Cursor),
    /// Last page was handed out; clear the checkpoint on the next call
    Complete,
}

/// Lazy sequence of non-empty pages; fused after the end or the first error.
pub struct Scanner<S> {
    source: S,
    filter: Filter,
    page_size: usize,
    retry: RetryPolicy,
    checkpoint: Option<CheckpointStore>,
    position: Option<Cursor>,
    pending: Pending,
    done: bool,
    stats: ScanStats,
}

impl<S: KeyValueSource> Scanner<S> {
    pub fn new(source: S, filter: Filter, page_size: usize) -> Self {
        Self {
            source,
            filter,
            page_size: page_size.max(1),
            retry: RetryPolicy::source(),
            checkpoint: None,
            position: None,
            pending: Pending::None,
            done: false,
            stats: ScanStats::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Persist progress to `store` as pages are handed off.
    pub fn with_checkpoint(mut self, store: CheckpointStore) -> Self {
        self.checkpoint = Some(store);
        self
    }

    /// Start from a previously persisted position instead of the beginning.
    pub fn resume_from(mut self, cursor: Option<Cursor>) -> Self {
        if let Some(c) = &cursor {
            log::info!("resuming scan from checkpoint {c}");
        }
        self.position = cursor;
        self
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Position the next source request starts from.
    pub fn position(&self) -> Option<&Cursor> {
        self.position.as_ref()
    }

    fn commit_pending(&mut self) -> Result<(), ScanError> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::None => Ok(()),
            Pending::Advance(cursor) => match &self.checkpoint {
                Some(store) => store.save(&cursor).map_err(ScanError::Checkpoint),
                None => Ok(()),
            },
            Pending::Complete => match &self.checkpoint {
                Some(store) => store.clear().map_err(ScanError::Checkpoint),
                None => Ok(()),
            },
        }
    }

    fn fetch_next(&mut self) -> Result<Option<Vec<Value>>, ScanError> {
        loop {
            let page = {
                let source = &self.source;
                let filter = &self.filter;
                let page_size = self.page_size;
                let start = self.position.as_ref();
                retry_with_backoff(
                    "scan page",
                    &self.retry,
                    SourceError::is_retryable,
                    |_| source.scan_page(filter, page_size, start),
                )
                .map_err(ScanError::Source)?
            };
            self.stats.pages += 1;

            let exhausted = page.next.is_none();
            self.position = page.next;

            if page.items.is_empty() {
                // Nothing to hand off: advance the persisted position right away
                match &self.position {
                    Some(c) => {
                        if let Some(store) = &self.checkpoint {
                            store.save(c).map_err(ScanError::Checkpoint)?;
                        }
                        continue;
                    }
                    None => {
                        if let Some(store) = &self.checkpoint {
                            store.clear().map_err(ScanError::Checkpoint)?;
                        }
                        return Ok(None);
                    }
                }
            }

            self.stats.items += page.items.len();
            self.pending = match (&self.position, exhausted) {
                (Some(c), false) => Pending::Advance(c.clone()),
                _ => Pending::Complete,
            };
            return Ok(Some(page.items));
        }
    }
}

impl<S: KeyValueSource> Iterator for Scanner<S> {
    type Item = Result<Vec<Value>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Err(e) = self.commit_pending() {
            self.done = true;
            return Some(Err(e));
        }
        if self.position.is_none() && self.stats.pages > 0 {
            // Previous page was the last one
            self.done = true;
            return None;
        }
        match self.fetch_next() {
            Ok(Some(items)) => Some(Ok(items)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use serde_json::json;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn items(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"uid": format!("u{i}"), "usingS3": i % 3 == 0}))
            .collect()
    }

    fn uids(pages: &[Vec<Value>]) -> Vec<String> {
        pages
            .iter()
            .flatten()
            .map(|v| v["uid"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn pages_concatenate_to_full_filtered_scan() {
        let all = items(23);
        let src = MemorySource::new(all.clone());
        let filter = Filter::equals("usingS3", 0);
        let pages: Vec<_> = Scanner::new(&src, filter.clone(), 4)
            .collect::<Result<_, _>>()
            .unwrap();

        let expected: Vec<String> = all
            .iter()
            .filter(|v| filter.matches(v))
            .map(|v| v["uid"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(uids(&pages), expected);
        assert!(pages.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn empty_source_yields_nothing() {
        let src = MemorySource::new(vec![]);
        let mut scanner = Scanner::new(&src, Filter::All, 10);
        assert!(scanner.next().is_none());
        assert!(scanner.next().is_none());
    }

    #[test]
    fn checkpoint_trails_handed_off_page_and_clears_at_end() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
        let src = MemorySource::new(items(6));
        let mut scanner = Scanner::new(&src, Filter::All, 2).with_checkpoint(store.clone());

        scanner.next().unwrap().unwrap();
        // page 1 in flight: nothing persisted yet
        assert_eq!(store.load().unwrap(), None);

        scanner.next().unwrap().unwrap();
        assert_eq!(store.load().unwrap(), Some(Cursor::new("2")));

        scanner.next().unwrap().unwrap();
        assert_eq!(store.load().unwrap(), Some(Cursor::new("4")));

        assert!(scanner.next().is_none());
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(scanner.stats(), ScanStats { pages: 3, items: 6 });
    }

    #[test]
    fn resume_after_restart_skips_flushed_pages() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
        let src = MemorySource::new(items(10));

        // First run: consume three pages, "crash" while the third is in flight
        let mut first = Scanner::new(&src, Filter::All, 3).with_checkpoint(store.clone());
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(first.next().unwrap().unwrap());
        }
        drop(first);

        let resumed = store.load().unwrap();
        assert_eq!(resumed, Some(Cursor::new("6")));
        let rest: Vec<_> = Scanner::new(&src, Filter::All, 3)
            .with_checkpoint(store.clone())
            .resume_from(resumed)
            .collect::<Result<_, _>>()
            .unwrap();

        // Only the in-flight page (u6..u8) is re-emitted
        assert_eq!(uids(&rest), vec!["u6", "u7", "u8", "u9"]);
        assert_eq!(uids(&seen[..2]), vec!["u0", "u1", "u2", "u3", "u4", "u5"]);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn empty_filtered_pages_are_skipped() {
        let src = MemorySource::new(
            (0..9).map(|i| json!({"uid": format!("u{i}"), "usingS3": i == 8})).collect(),
        );
        let mut scanner = Scanner::new(&src, Filter::equals("usingS3", 1), 2);
        let page = scanner.next().unwrap().unwrap();
        assert_eq!(page, vec![json!({"uid": "u8", "usingS3": true})]);
        assert!(scanner.next().is_none());
        assert_eq!(scanner.stats().pages, 5);
    }

    struct Flaky {
        inner: MemorySource,
        failures_left: Cell<u32>,
    }

    impl KeyValueSource for Flaky {
        fn scan_page(
            &self,
            filter: &Filter,
            page_size: usize,
            start: Option<&Cursor>,
        ) -> Result<crate::source::ScanPage, SourceError> {
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(SourceError::Throttled("ProvisionedThroughputExceeded".into()));
            }
            self.inner.scan_page(filter, page_size, start)
        }
    }

    #[test]
    fn transient_source_errors_are_retried() {
        let src = Flaky {
            inner: MemorySource::new(items(4)),
            failures_left: Cell::new(2),
        };
        let pages: Vec<_> = Scanner::new(&src, Filter::All, 10)
            .with_retry(RetryPolicy::immediate(3))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(uids(&pages).len(), 4);
    }

    #[test]
    fn exhausted_retries_end_the_scan() {
        let src = Flaky {
            inner: MemorySource::new(items(4)),
            failures_left: Cell::new(10),
        };
        let mut scanner = Scanner::new(&src, Filter::All, 10).with_retry(RetryPolicy::immediate(2));
        let err = scanner.next().unwrap().unwrap_err();
        assert!(matches!(err, ScanError::Source(SourceError::Throttled(_))));
        assert!(scanner.next().is_none());
    }
}
