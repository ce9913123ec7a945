//! Running statistics for one ingestion run.

use serde::{Deserialize, Serialize};

/// Counters accumulated over one pipeline run.
///
/// Owned by exactly one run. For every dispatched batch,
/// `succeeded + failed + duplicates` accounts for that batch's
/// attempted rows; the running totals never decrease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Rows read from the source.
    pub total_rows: usize,
    /// Records that parsed and processed successfully.
    pub succeeded: usize,
    /// Rows that failed to parse or records that failed processing.
    pub failed: usize,
    /// Rows skipped because their dedupe key was already seen.
    pub duplicates: usize,
    /// Batches handed to the per-record processor.
    pub batches_processed: usize,
    /// Human-readable error strings, one per failure.
    pub errors: Vec<String>,
}

impl ProcessingStats {
    /// Creates zeroed stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of rows accounted for by the three outcome counters.
    #[must_use]
    pub fn accounted(&self) -> usize {
        self.succeeded + self.failed + self.duplicates
    }

    /// Folds another run's counters into this one.
    pub fn merge(&mut self, other: &Self) {
        self.total_rows += other.total_rows;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.duplicates += other.duplicates;
        self.batches_processed += other.batches_processed;
        self.errors.extend(other.errors.iter().cloned());
    }
}
