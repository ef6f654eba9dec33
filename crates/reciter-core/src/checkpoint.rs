//! Cursor store: the persisted resume position of a paginated scan
//!
//! A single small JSON file, replaced atomically (tmp + rename) so a crash
//! mid-write never leaves a truncated checkpoint behind.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Opaque continuation token handed out by a key-value source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    #[serde(rename = "LastEvaluatedKey")]
    last_evaluated_key: Cursor,
}

/// File-backed checkpoint; single writer (the scanner), read at startup.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved cursor, or `None` when no scan is in progress.
    pub fn load(&self) -> io::Result<Option<Cursor>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let file: CheckpointFile = serde_json::from_slice(&bytes).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("corrupt checkpoint {}: {e}", self.path.display()),
            )
        })?;
        Ok(Some(file.last_evaluated_key))
    }

    pub fn save(&self, cursor: &Cursor) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec(&CheckpointFile {
            last_evaluated_key: cursor.clone(),
        })
        .map_err(io::Error::other)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        log::debug!("checkpoint saved: {cursor}");
        Ok(())
    }

    /// Forget the position; the next scan starts from the beginning.
    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                log::debug!("checkpoint cleared: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
