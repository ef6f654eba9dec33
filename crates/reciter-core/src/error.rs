//! Error type for fetching and decoding one blob object

use std::fmt;

use crate::blob::BlobError;

#[derive(Debug)]
pub enum FetchError {
    /// Download failed (after retries, or not retryable)
    Blob(BlobError),
    /// Object downloaded but holds no decodable record
    Decode(String),
    /// Local download directory problem
    Io(std::io::Error),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Blob(e) => e.is_retryable(),
            FetchError::Decode(_) => false,
            FetchError::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Blob(e) => write!(f, "{e}"),
            FetchError::Decode(msg) => write!(f, "decode error: {msg}"),
            FetchError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Blob(e) => Some(e),
            FetchError::Decode(_) => None,
            FetchError::Io(e) => Some(e),
        }
    }
}

impl From<BlobError> for FetchError {
    fn from(e: BlobError) -> Self {
        FetchError::Blob(e)
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Io(e)
    }
}
