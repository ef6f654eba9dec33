//! Key-value source abstraction: one paginated table scan at a time
//!
//! Implementations return at most `page_size` items per call and an opaque
//! continuation cursor while more items remain. As with the hosted store,
//! the page limit is applied before the filter, so a page may come back
//! shorter than `page_size` (or empty) while the scan is not finished.

use std::fmt;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;

use serde_json::Value;

use crate::checkpoint::Cursor;

/// Scan predicate.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    #[default]
    All,
    /// `attribute = value`, compared after scalar canonicalization
    Equals { attribute: String, value: Value },
}

impl Filter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, item: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Equals { attribute, value } => match item.get(attribute) {
                Some(found) => match (canonical(found), canonical(value)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
                None => false,
            },
        }
    }
}

#[derive(Debug, PartialEq)]
enum Canonical<'a> {
    Number(f64),
    Text(&'a str),
}

/// Numbers and numeric strings by value, booleans as 1/0, other strings as-is.
fn canonical(v: &Value) -> Option<Canonical<'_>> {
    match v {
        Value::Bool(b) => Some(Canonical::Number(if *b { 1.0 } else { 0.0 })),
        Value::Number(n) => n.as_f64().map(Canonical::Number),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => Some(Canonical::Number(n)),
            Err(_) => Some(Canonical::Text(s)),
        },
        _ => None,
    }
}

/// One page of a scan.
#[derive(Debug, Default)]
pub struct ScanPage {
    pub items: Vec<Value>,
    /// `None` once the table is exhausted
    pub next: Option<Cursor>,
}

#[derive(Debug)]
pub enum SourceError {
    /// Provisioned throughput exceeded / request rate too high
    Throttled(String),
    Io(io::Error),
    /// Resume cursor does not point into this source
    InvalidCursor(String),
    /// Table or export missing
    NotFound(String),
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Throttled(_) => true,
            SourceError::Io(e) => !matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied | io::ErrorKind::InvalidData
            ),
            SourceError::InvalidCursor(_) | SourceError::NotFound(_) => false,
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Throttled(msg) => write!(f, "throttled: {msg}"),
            SourceError::Io(e) => write!(f, "I/O error: {e}"),
            SourceError::InvalidCursor(c) => write!(f, "invalid cursor: {c}"),
            SourceError::NotFound(what) => write!(f, "source not found: {what}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SourceError {
    fn from(e: io::Error) -> Self {
        SourceError::Io(e)
    }
}

pub trait KeyValueSource {
    /// Fetch one page starting at `start` (`None` = beginning of the table).
    fn scan_page(
        &self,
        filter: &Filter,
        page_size: usize,
        start: Option<&Cursor>,
    ) -> Result<ScanPage, SourceError>;
}

impl<S: KeyValueSource + ?Sized> KeyValueSource for &S {
    fn scan_page(
        &self,
        filter: &Filter,
        page_size: usize,
        start: Option<&Cursor>,
    ) -> Result<ScanPage, SourceError> {
        (**self).scan_page(filter, page_size, start)
    }
}

fn parse_offset(cursor: Option<&Cursor>) -> Result<u64, SourceError> {
    match cursor {
        None => Ok(0),
        Some(c) => c
            .as_str()
            .parse::<u64>()
            .map_err(|_| SourceError::InvalidCursor(c.to_string())),
    }
}

/// In-memory table; the cursor is the offset of the next unread item.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    items: Vec<Value>,
}

impl MemorySource {
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl KeyValueSource for MemorySource {
    fn scan_page(
        &self,
        filter: &Filter,
        page_size: usize,
        start: Option<&Cursor>,
    ) -> Result<ScanPage, SourceError> {
        let offset = parse_offset(start)? as usize;
        if offset > self.items.len() {
            return Err(SourceError::InvalidCursor(offset.to_string()));
        }
        let end = (offset + page_size.max(1)).min(self.items.len());
        let items = self.items[offset..end]
            .iter()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        let next = (end < self.items.len()).then(|| Cursor::new(end.to_string()));
        Ok(ScanPage { items, next })
    }
}

/// Newline-delimited JSON export of a table; the cursor is a byte offset.
///
/// Lines that are not UTF-8 or fail to parse are logged and skipped; they
/// still count against the page limit.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeyValueSource for JsonlSource {
    fn scan_page(
        &self,
        filter: &Filter,
        page_size: usize,
        start: Option<&Cursor>,
    ) -> Result<ScanPage, SourceError> {
        let file = std::fs::File::open(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(self.path.display().to_string()),
            _ => SourceError::Io(e),
        })?;
        let len = file.metadata()?.len();
        let offset = parse_offset(start)?;
        if offset > len {
            return Err(SourceError::InvalidCursor(offset.to_string()));
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;

        let mut items = Vec::new();
        let mut pos = offset;
        let mut read = 0usize;
        let mut buf = Vec::new();
        while read < page_size.max(1) {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            let at = pos;
            pos += n as u64;
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    read += 1;
                    log::warn!("{}: skipping undecodable line at byte {at}: {e}", self.path.display());
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            read += 1;
            match serde_json::from_str::<Value>(line) {
                Ok(item) if filter.matches(&item) => items.push(item),
                Ok(_) => {}
                Err(e) => log::warn!(
                    "{}: skipping malformed line at byte {at}: {e}",
                    self.path.display()
                ),
            }
        }

        let next = (pos < len).then(|| Cursor::new(pos.to_string()));
        Ok(ScanPage { items, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_canonicalizes_scalars() {
        let f = Filter::equals("usingS3", 0);
        assert!(f.matches(&json!({"usingS3": 0})));
        assert!(f.matches(&json!({"usingS3": "0"})));
        assert!(f.matches(&json!({"usingS3": false})));
        assert!(f.matches(&json!({"usingS3": 0.0})));
        assert!(!f.matches(&json!({"usingS3": 1})));
        assert!(!f.matches(&json!({"usingS3": true})));
        assert!(!f.matches(&json!({"uid": "x"})));
        assert!(!f.matches(&json!({"usingS3": null})));
    }

    #[test]
    fn filter_text_values() {
        let f = Filter::equals("status", "ACCEPTED");
        assert!(f.matches(&json!({"status": "ACCEPTED"})));
        assert!(!f.matches(&json!({"status": "REJECTED"})));
        assert!(Filter::All.matches(&json!({})));
    }

    #[test]
    fn memory_source_limit_before_filter() {
        let src = MemorySource::new(
            (0..5).map(|i| json!({"uid": i, "keep": i % 2 == 0})).collect(),
        );
        let f = Filter::equals("keep", true);
        let page = src.scan_page(&f, 2, None).unwrap();
        assert_eq!(page.items, vec![json!({"uid": 0, "keep": true})]);
        assert_eq!(page.next, Some(Cursor::new("2")));

        let page = src.scan_page(&f, 2, page.next.as_ref()).unwrap();
        assert_eq!(page.items, vec![json!({"uid": 2, "keep": true})]);

        let page = src.scan_page(&f, 2, page.next.as_ref()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next, None);
    }

    #[test]
    fn memory_source_rejects_foreign_cursor() {
        let src = MemorySource::new(vec![json!({})]);
        let err = src
            .scan_page(&Filter::All, 10, Some(&Cursor::new("abc")))
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidCursor(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn jsonl_source_pages_by_byte_offset() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("analysis.jsonl");
        std::fs::write(
            &path,
            "{\"uid\":\"a\"}\n{\"uid\":\"b\"}\n\n{broken\n{\"uid\":\"c\"}\n",
        )
        .unwrap();
        let src = JsonlSource::new(&path);

        let mut cursor = None;
        let mut uids = Vec::new();
        let mut pages = 0;
        loop {
            let page = src.scan_page(&Filter::All, 2, cursor.as_ref()).unwrap();
            pages += 1;
            uids.extend(page.items.iter().map(|i| i["uid"].as_str().unwrap().to_string()));
            match page.next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        assert_eq!(uids, vec!["a", "b", "c"]);
        assert_eq!(pages, 2);
    }

    #[test]
    fn jsonl_skips_undecodable_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("analysis.jsonl");
        std::fs::write(&path, b"{\"uid\":\"a\"}\n{\"uid\":\"b\xff\"}\n{\"uid\":\"c\"}\n").unwrap();
        let src = JsonlSource::new(&path);

        let page = src.scan_page(&Filter::All, 10, None).unwrap();
        let uids: Vec<_> = page.items.iter().map(|i| i["uid"].as_str().unwrap()).collect();
        assert_eq!(uids, vec!["a", "c"]);
        assert_eq!(page.next, None);

        // the bad line still takes a slot and the cursor moves past it
        let page = src.scan_page(&Filter::All, 2, None).unwrap();
        assert_eq!(page.items.len(), 1);
        let page = src.scan_page(&Filter::All, 2, page.next.as_ref()).unwrap();
        assert_eq!(page.items, vec![serde_json::json!({"uid": "c"})]);
        assert_eq!(page.next, None);
    }

    #[test]
    fn jsonl_missing_file_is_not_retryable() {
        let src = JsonlSource::new("/nonexistent/analysis.jsonl");
        let err = src.scan_page(&Filter::All, 10, None).unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn throttling_is_retryable() {
        assert!(SourceError::Throttled("slow down".into()).is_retryable());
        assert!(SourceError::Io(io::Error::from(io::ErrorKind::TimedOut)).is_retryable());
    }
}
