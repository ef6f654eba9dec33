//! ReCiter ETL load side: staging files and the relational warehouse
//!
//! Row sets are written to CSV staging files and bulk loaded into the
//! warehouse one table per transaction, either replacing the catalog or
//! appending to it.

pub mod loader;
pub mod sink;
pub mod sql;
pub mod staging;

pub use loader::{LoadError, LoadMode, LoadReport, Loader, TableOutcome};
pub use sink::{DuckDbSink, DuckDbTarget, RelationalSink, SinkError};
pub use staging::StagedFile;
