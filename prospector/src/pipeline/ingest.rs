//! The batched ingestion pipeline.

use super::{BatchConfig, ProcessingStats};
use crate::cancellation::CancellationToken;
use crate::errors::{CollectError, PipelineError};
use crate::sources::{RawRow, RowSource};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The generic unit of work flowing through the pipeline.
///
/// Created by the parser, passed through by value, never mutated by two
/// workers concurrently.
pub trait Record: Clone + Send + Sync + 'static {
    /// A stable key used to recognize the same logical record twice.
    fn dedupe_key(&self) -> String;
}

/// Turns a raw row into a record.
///
/// Field mapping lives entirely behind this seam; the pipeline treats
/// it as opaque.
pub trait RowParser<R: Record>: Send + Sync {
    /// Parses one row. Errors are counted and never abort the run.
    fn parse_row(&self, row: &RawRow) -> Result<R, CollectError>;
}

/// Processes one record, typically by enriching it through external
/// collectors.
#[async_trait]
pub trait RecordProcessor<R: Record>: Send + Sync {
    /// Processes one record. Errors are counted per record and never
    /// abort the batch.
    async fn process(&self, record: R) -> Result<R, CollectError>;
}

/// A processor that passes records through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProcessor;

#[async_trait]
impl<R: Record> RecordProcessor<R> for IdentityProcessor {
    async fn process(&self, record: R) -> Result<R, CollectError> {
        Ok(record)
    }
}

/// Result of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOutcome<R> {
    /// Processed records, in input row order.
    pub records: Vec<R>,
    /// Finalized counters for the run.
    pub stats: ProcessingStats,
    /// True if the run wound down early due to cancellation. Stats and
    /// records reflect exactly what was processed before the stop.
    pub cancelled: bool,
}

/// Streams raw rows, parses and deduplicates them, groups them into
/// rate-limited batches, and hands each batch to the per-record
/// processor.
///
/// Within a batch, records are processed concurrently and results keep
/// input order. Batch N's inter-batch delay always completes before
/// batch N+1 begins filling; that ordering is deliberate backpressure.
pub struct BatchIngestionPipeline<R: Record> {
    config: BatchConfig,
    parser: Arc<dyn RowParser<R>>,
    processor: Arc<dyn RecordProcessor<R>>,
    cancel: Arc<CancellationToken>,
}

impl<R: Record> BatchIngestionPipeline<R> {
    /// Creates a pipeline from a parser and processor.
    #[must_use]
    pub fn new(
        config: BatchConfig,
        parser: Arc<dyn RowParser<R>>,
        processor: Arc<dyn RecordProcessor<R>>,
    ) -> Self {
        Self {
            config,
            parser,
            processor,
            cancel: Arc::new(CancellationToken::new()),
        }
    }

    /// Attaches an externally-owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the pipeline's configuration.
    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Runs one ingestion over the given source.
    ///
    /// Only a failure to open or read the source itself is fatal. Parse
    /// failures, duplicates, and per-record processing errors are
    /// absorbed into the returned [`ProcessingStats`].
    pub async fn ingest<S: RowSource>(&self, mut source: S) -> Result<IngestOutcome<R>, PipelineError> {
        source.open().await?;

        let run_id = Uuid::new_v4();
        let estimate = source.estimated_rows();
        info!(run_id = %run_id, estimated_rows = ?estimate, "ingestion run started");

        let stats = Arc::new(Mutex::new(ProcessingStats::new()));
        let mut seen: HashSet<String> = HashSet::new();
        let mut batch: Vec<R> = Vec::with_capacity(self.config.batch_size);
        let mut inflight: JoinSet<(usize, Vec<R>)> = JoinSet::new();
        let mut completed: Vec<(usize, Vec<R>)> = Vec::new();
        let mut batch_index = 0usize;
        let mut row_index = 0usize;
        let mut cancelled = false;

        loop {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let Some(row) = source.next_row().await? else {
                break;
            };
            row_index += 1;
            stats.lock().total_rows += 1;

            let record = match self.parser.parse_row(&row) {
                Ok(record) => record,
                Err(error) => {
                    let mut stats = stats.lock();
                    stats.failed += 1;
                    stats.errors.push(format!("row {row_index}: {error}"));
                    continue;
                }
            };

            if self.config.dedupe_enabled {
                let key = record.dedupe_key();
                if !seen.insert(key.clone()) {
                    stats.lock().duplicates += 1;
                    debug!(run_id = %run_id, key = %key, "duplicate record skipped");
                    continue;
                }
            }

            batch.push(record);
            if batch.len() >= self.config.batch_size {
                self.dispatch(
                    &mut inflight,
                    &mut completed,
                    batch_index,
                    std::mem::take(&mut batch),
                    &stats,
                )
                .await;
                batch_index += 1;
                batch = Vec::with_capacity(self.config.batch_size);

                // Rate limiting between full batches. The final partial
                // batch is exempt.
                if self.config.inter_batch_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.config.inter_batch_delay_ms))
                        .await;
                }
            }
        }

        if !cancelled && !batch.is_empty() {
            self.dispatch(&mut inflight, &mut completed, batch_index, batch, &stats)
                .await;
        }

        while let Some(joined) = inflight.join_next().await {
            match joined {
                Ok(pair) => completed.push(pair),
                Err(join_error) => {
                    warn!(run_id = %run_id, error = %join_error, "batch task failed");
                    stats
                        .lock()
                        .errors
                        .push(format!("batch task failed: {join_error}"));
                }
            }
        }

        completed.sort_by_key(|(index, _)| *index);
        let records: Vec<R> = completed
            .into_iter()
            .flat_map(|(_, records)| records)
            .collect();

        let stats = Arc::try_unwrap(stats)
            .map(Mutex::into_inner)
            .unwrap_or_else(|shared| shared.lock().clone());

        info!(
            run_id = %run_id,
            total_rows = stats.total_rows,
            succeeded = stats.succeeded,
            failed = stats.failed,
            duplicates = stats.duplicates,
            batches = stats.batches_processed,
            cancelled,
            "ingestion run finished"
        );

        Ok(IngestOutcome {
            records,
            stats,
            cancelled,
        })
    }

    /// Hands a filled batch to the processor, waiting for an in-flight
    /// slot when the concurrency cap is reached.
    async fn dispatch(
        &self,
        inflight: &mut JoinSet<(usize, Vec<R>)>,
        completed: &mut Vec<(usize, Vec<R>)>,
        batch_index: usize,
        batch: Vec<R>,
        stats: &Arc<Mutex<ProcessingStats>>,
    ) {
        let cap = self.config.max_concurrent_batches.max(1);
        while inflight.len() >= cap {
            match inflight.join_next().await {
                Some(Ok(pair)) => completed.push(pair),
                Some(Err(join_error)) => {
                    stats
                        .lock()
                        .errors
                        .push(format!("batch task failed: {join_error}"));
                }
                None => break,
            }
        }

        let processor = Arc::clone(&self.processor);
        let stats = Arc::clone(stats);
        inflight.spawn(Self::process_batch(processor, stats, batch_index, batch));
    }

    /// Processes one batch's records concurrently, preserving input
    /// order in the kept results.
    async fn process_batch(
        processor: Arc<dyn RecordProcessor<R>>,
        stats: Arc<Mutex<ProcessingStats>>,
        batch_index: usize,
        batch: Vec<R>,
    ) -> (usize, Vec<R>) {
        let results = join_all(batch.into_iter().map(|record| {
            let processor = Arc::clone(&processor);
            async move { processor.process(record).await }
        }))
        .await;

        let mut kept = Vec::with_capacity(results.len());
        {
            let mut stats = stats.lock();
            for result in results {
                match result {
                    Ok(record) => {
                        stats.succeeded += 1;
                        kept.push(record);
                    }
                    Err(error) => {
                        stats.failed += 1;
                        stats.errors.push(format!("batch {batch_index}: {error}"));
                    }
                }
            }
            stats.batches_processed += 1;
        }

        (batch_index, kept)
    }
}

impl<R: Record> std::fmt::Debug for BatchIngestionPipeline<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchIngestionPipeline")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
