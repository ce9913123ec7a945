//! Batched, rate-limited, deduplicating ingestion.
//!
//! This module provides:
//! - Batch configuration and running statistics
//! - The ingestion pipeline itself
//! - Cross-run global deduplication

mod config;
mod dedupe;
mod ingest;
mod stats;


pub use config::BatchConfig;
pub use dedupe::{merge_runs, MergedRuns};
pub use ingest::{
    BatchIngestionPipeline, IdentityProcessor, IngestOutcome, Record, RecordProcessor, RowParser,
};
pub use stats::ProcessingStats;
