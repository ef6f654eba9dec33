//! Pipeline orchestration: batching, fetch/transform/load flushes,
//! second-pass reconciliation and citation enrichment.

pub mod citations;
pub mod config;
pub mod dispatcher;
pub mod processor;
pub mod runner;
pub mod stats;

pub use citations::{
    CitationError, CitationRecord, CitationRows, CitationSource, EnrichSummary,
    JsonlCitationSource, enrich,
};
pub use config::{EnrichConfig, PipelineConfig};
pub use dispatcher::{BatchProcessor, Dispatcher, FlushCounts, RecordClass};
pub use processor::{EtlProcessor, MISSING_ID, ProcessStats};
pub use runner::{RunMode, Sources, run};
pub use stats::RunSummary;
