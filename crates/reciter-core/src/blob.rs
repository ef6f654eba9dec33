//! Blob store abstraction for externally-stored feature records

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Listing names that are never objects.
const IGNORED_NAMES: &[&str] = &[".DS_Store", ".gitkeep"];

pub(crate) fn is_ignored(key: &str) -> bool {
    let name = key.rsplit('/').next().unwrap_or(key);
    IGNORED_NAMES.contains(&name)
}

#[derive(Debug)]
pub enum BlobError {
    NotFound(String),
    /// HTTP failure; `status` is `None` for connect/timeout errors
    Http {
        status: Option<u16>,
        message: String,
    },
    Io(io::Error),
}

impl BlobError {
    /// Connectivity, 429 and 5xx are worth retrying; so is local I/O unless
    /// the disk is full.
    pub fn is_retryable(&self) -> bool {
        match self {
            BlobError::NotFound(_) => false,
            BlobError::Http { status, .. } => match status {
                None => true,
                Some(429) => true,
                Some(s) => *s >= 500,
            },
            BlobError::Io(e) => e.kind() != io::ErrorKind::StorageFull,
        }
    }
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::NotFound(key) => write!(f, "object not found: {key}"),
            BlobError::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            BlobError::Http {
                status: None,
                message,
            } => write!(f, "request failed: {message}"),
            BlobError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for BlobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BlobError {
    fn from(e: io::Error) -> Self {
        BlobError::Io(e)
    }
}

pub trait BlobStore: Send + Sync {
    /// All object keys starting with `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError>;

    /// Download `key` into `dest`, returning the number of bytes written.
    fn download(&self, key: &str, dest: &Path) -> Result<u64, BlobError>;
}

/// Directory tree acting as a bucket; keys are `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BlobStore for LocalBlobStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let pattern = format!(
            "{}/**/*",
            glob::Pattern::escape(&self.root.to_string_lossy())
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| BlobError::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| BlobError::Io(e.into_error()))?;
            if !path.is_file() {
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) && !is_ignored(&key) {
                keys.push(key);
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }

    fn download(&self, key: &str, dest: &Path) -> Result<u64, BlobError> {
        let src = self.root.join(key);
        match std::fs::copy(&src, dest) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BlobError::NotFound(key.to_string())),
            Err(e) => Err(BlobError::Io(e)),
        }
    }
}
