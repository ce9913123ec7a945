//! Mock collectors and processors.

use crate::collect::{Collector, Profile};
use crate::errors::CollectError;
use crate::pipeline::{Record, RecordProcessor};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// A collector that fails a fixed number of times, then succeeds.
#[derive(Debug)]
pub struct FlakyCollector {
    name: String,
    fail_times: u32,
    calls: AtomicU32,
    profile: Profile,
}

impl FlakyCollector {
    /// Creates a collector that fails `fail_times` calls with a
    /// transient error before returning `profile`.
    #[must_use]
    pub fn new(name: impl Into<String>, fail_times: u32, profile: Profile) -> Self {
        Self {
            name: name.into(),
            fail_times,
            calls: AtomicU32::new(0),
            profile,
        }
    }

    /// Returns how many times `collect` was invoked.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for FlakyCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, _key: &str) -> Result<Profile, CollectError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_times {
            Err(CollectError::transient(format!(
                "{} flaking on call {}",
                self.name,
                n + 1
            )))
        } else {
            Ok(self.profile.clone())
        }
    }
}

/// A collector that always fails with a fixed error.
#[derive(Debug)]
pub struct FailingCollector {
    name: String,
    error: CollectError,
    calls: AtomicU32,
}

impl FailingCollector {
    /// Creates a collector that always returns a clone of `error`.
    #[must_use]
    pub fn new(name: impl Into<String>, error: CollectError) -> Self {
        Self {
            name: name.into(),
            error,
            calls: AtomicU32::new(0),
        }
    }

    /// Returns how many times `collect` was invoked.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for FailingCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, _key: &str) -> Result<Profile, CollectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// A collector that always returns the same profile.
#[derive(Debug, Clone)]
pub struct StaticCollector {
    name: String,
    profile: Profile,
}

impl StaticCollector {
    /// Creates a collector with a canned profile.
    #[must_use]
    pub fn new(name: impl Into<String>, profile: Profile) -> Self {
        Self {
            name: name.into(),
            profile,
        }
    }
}

#[async_trait]
impl Collector for StaticCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, _key: &str) -> Result<Profile, CollectError> {
        Ok(self.profile.clone())
    }
}

/// A processor that counts invocations and passes records through.
#[derive(Debug, Default)]
pub struct CountingProcessor {
    processed: AtomicUsize,
}

impl CountingProcessor {
    /// Creates a processor with a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many records were processed.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: Record> RecordProcessor<R> for CountingProcessor {
    async fn process(&self, record: R) -> Result<R, CollectError> {
        self.processed.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }
}

/// A processor that fails every nth call with a transient error.
#[derive(Debug)]
pub struct FailEveryNthProcessor {
    n: usize,
    calls: AtomicUsize,
}

impl FailEveryNthProcessor {
    /// Creates a processor that fails calls `n`, `2n`, `3n`, ...
    /// (1-based).
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            n: n.max(1),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<R: Record> RecordProcessor<R> for FailEveryNthProcessor {
    async fn process(&self, record: R) -> Result<R, CollectError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % self.n == 0 {
            Err(CollectError::transient(format!("injected failure on call {call}")))
        } else {
            Ok(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flaky_collector_sequence() {
        let collector = FlakyCollector::new("ads", 2, Profile::new().with_signal("x", 1));

        assert!(collector.collect("acme.com").await.is_err());
        assert!(collector.collect("acme.com").await.is_err());
        assert!(collector.collect("acme.com").await.is_ok());
        assert_eq!(collector.calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_collector_counts_calls() {
        let collector = FailingCollector::new("ads", CollectError::validation("bad"));
        let _ = collector.collect("acme.com").await;
        let _ = collector.collect("acme.com").await;
        assert_eq!(collector.calls(), 2);
    }
}
