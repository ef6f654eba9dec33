//! ReCiter ETL core - shared infrastructure for the extract side of the pipeline
//!
//! Resumable paginated scanning of a key-value source, bounded-concurrency
//! blob fetching, and the retry/backoff, logging, progress and shutdown
//! plumbing used by every other crate in the workspace.

pub mod blob;
pub mod checkpoint;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod logging;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod scanner;
pub mod shutdown;
pub mod source;
pub mod work_queue;

// Re-exports for convenience
pub use blob::{BlobError, BlobStore, LocalBlobStore};
pub use checkpoint::{CheckpointStore, Cursor};
pub use error::FetchError;
pub use fetcher::{FailedFetch, FetchOutcome, FetchedObject, Fetcher};
pub use http::HttpBlobStore;
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use rate_limit::TokenBucket;
pub use retry::{RetryPolicy, retry_with_backoff};
pub use scanner::{ScanError, ScanStats, Scanner};
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown};
pub use source::{Filter, JsonlSource, KeyValueSource, MemorySource, ScanPage, SourceError};
pub use work_queue::WorkQueue;
