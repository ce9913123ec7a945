//! # Prospector
//!
//! The resilient concurrent collection core of a business-record
//! enrichment tool.
//!
//! External data sources (ad networks, funding and hiring data
//! providers, technology detection services) are slow, rate-limited,
//! and regularly down. Prospector produces a best-effort result anyway:
//!
//! - **Retry + circuit breaking**: every external call runs through
//!   [`handler::ErrorHandler::run_protected`], which composes a
//!   [`retry::RetryPolicy`] with per-service [`breaker::CircuitBreaker`]s
//! - **Graceful degradation**: [`collect::SafeCollector`] converts any
//!   remaining failure into a default profile instead of an error
//! - **Concurrent aggregation**: [`aggregate::IntelligenceAggregator`]
//!   fans out to all sources per record and scores the result
//! - **Batched ingestion**: [`pipeline::BatchIngestionPipeline`] streams,
//!   parses, deduplicates, batches, and rate-limits records end to end
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use prospector::prelude::*;
//!
//! let handler = Arc::new(ErrorHandler::from_config(ResilienceConfig::default()));
//! let aggregator = IntelligenceAggregator::new(handler)
//!     .register(SourceSpec::ads(), ads_collector)
//!     .register(SourceSpec::funding(), funding_collector);
//!
//! let pipeline = BatchIngestionPipeline::new(
//!     BatchConfig::default(),
//!     parser,
//!     Arc::new(aggregator),
//! );
//! let outcome = pipeline.ingest(source).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod aggregate;
pub mod breaker;
pub mod cancellation;
pub mod collect;
pub mod errors;
pub mod handler;
pub mod pipeline;
pub mod retry;
pub mod sources;
pub mod telemetry;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregate::{
        CompanyIntelligence, EnrichableRecord, IntelligenceAggregator, SourceSpec,
    };
    pub use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use crate::cancellation::{CancelCallback, CancellationToken};
    pub use crate::collect::{Collector, Profile, SafeCollector};
    pub use crate::errors::{CollectError, ErrorKind, PipelineError, SourceError};
    pub use crate::handler::{ErrorHandler, ResilienceConfig};
    pub use crate::pipeline::{
        merge_runs, BatchConfig, BatchIngestionPipeline, IdentityProcessor, IngestOutcome,
        MergedRuns, ProcessingStats, Record, RecordProcessor, RowParser,
    };
    pub use crate::retry::RetryPolicy;
    pub use crate::sources::{InMemoryRowSource, JsonlRowSource, RawRow, RowSource};
    pub use crate::telemetry::{
        CollectingTelemetrySink, NoOpTelemetrySink, OperationContext, Severity, TelemetryEvent,
        TelemetrySink, TracingTelemetrySink,
    };
}
