//! Batch configuration.

use serde::{Deserialize, Serialize};

/// Configuration for one ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Records per batch.
    pub batch_size: usize,
    /// Sleep between full batches, in milliseconds. This is the
    /// rate-limiting control that keeps downstream collectors alive.
    pub inter_batch_delay_ms: u64,
    /// How many dispatched batches may be in flight at once.
    pub max_concurrent_batches: usize,
    /// Whether to skip records whose dedupe key was already seen in
    /// this run.
    pub dedupe_enabled: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            inter_batch_delay_ms: 500,
            max_concurrent_batches: 1,
            dedupe_enabled: true,
        }
    }
}

impl BatchConfig {
    /// Creates a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Sets the inter-batch delay.
    #[must_use]
    pub fn with_inter_batch_delay_ms(mut self, delay: u64) -> Self {
        self.inter_batch_delay_ms = delay;
        self
    }

    /// Sets the maximum number of concurrent batches.
    #[must_use]
    pub fn with_max_concurrent_batches(mut self, max: usize) -> Self {
        self.max_concurrent_batches = max.max(1);
        self
    }

    /// Enables or disables per-run deduplication.
    #[must_use]
    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.inter_batch_delay_ms, 500);
        assert_eq!(config.max_concurrent_batches, 1);
        assert!(config.dedupe_enabled);
    }

    #[test]
    fn test_builder_clamps_zero_sizes() {
        let config = BatchConfig::new()
            .with_batch_size(0)
            .with_max_concurrent_batches(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_concurrent_batches, 1);
    }
}
