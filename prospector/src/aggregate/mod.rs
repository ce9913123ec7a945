//! Fan-out aggregation across intelligence sources.
//!
//! For one record, every registered source is queried concurrently
//! through its [`SafeCollector`]; results are merged into a composite
//! profile with a 0.0-1.0 data-quality score. Collector failures have
//! already been absorbed by the safe wrapper, so aggregation itself
//! never fails.

use crate::collect::{Collector, Profile, SafeCollector};
use crate::errors::CollectError;
use crate::handler::ErrorHandler;
use crate::pipeline::{Record, RecordProcessor};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Scoring description of one source: its weight and which signals
/// count as strong versus weak evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Source name; must match the collector's name.
    pub name: String,
    /// Relative importance in the quality score.
    pub weight: f64,
    /// The signal whose presence earns the full weight.
    pub primary_signal: String,
    /// Signals whose presence earns half the weight.
    pub secondary_signals: Vec<String>,
}

impl SourceSpec {
    /// Creates a spec with no secondary signals.
    #[must_use]
    pub fn new(name: impl Into<String>, weight: f64, primary_signal: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight,
            primary_signal: primary_signal.into(),
            secondary_signals: Vec::new(),
        }
    }

    /// Sets the secondary signals.
    #[must_use]
    pub fn with_secondary_signals(mut self, signals: Vec<String>) -> Self {
        self.secondary_signals = signals;
        self
    }

    /// Stock ad-intelligence source.
    #[must_use]
    pub fn ads() -> Self {
        Self::new("ads", 0.30, "active_campaigns")
            .with_secondary_signals(vec!["ad_platforms".to_string()])
    }

    /// Stock funding-intelligence source.
    #[must_use]
    pub fn funding() -> Self {
        Self::new("funding", 0.25, "total_raised").with_secondary_signals(vec![
            "last_round".to_string(),
            "investors".to_string(),
        ])
    }

    /// Stock technology-detection source.
    #[must_use]
    pub fn technology() -> Self {
        Self::new("technology", 0.25, "tech_stack")
            .with_secondary_signals(vec!["cms".to_string()])
    }

    /// Stock hiring-intelligence source.
    #[must_use]
    pub fn hiring() -> Self {
        Self::new("hiring", 0.20, "open_roles")
            .with_secondary_signals(vec!["growth_rate".to_string()])
    }
}

/// Composite intelligence for one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyIntelligence {
    /// The record's stable key (typically its domain).
    pub key: String,
    /// Human-readable name.
    pub display_name: String,
    /// Non-default profiles by source name.
    pub profiles: HashMap<String, Profile>,
    /// Weighted 0.0-1.0 score of how much signal we actually got.
    pub quality_score: f64,
    /// When the fan-out completed.
    pub collected_at: DateTime<Utc>,
}

struct RegisteredSource {
    spec: SourceSpec,
    collector: SafeCollector,
}

/// Fans out to all registered sources for one record and merges the
/// results.
///
/// Collectors are held behind the single-method [`Collector`] interface;
/// the aggregator never inspects concrete types. All calls for one
/// record are issued concurrently and awaited together.
pub struct IntelligenceAggregator {
    handler: Arc<ErrorHandler>,
    sources: Vec<RegisteredSource>,
}

impl IntelligenceAggregator {
    /// Creates an aggregator with no sources.
    #[must_use]
    pub fn new(handler: Arc<ErrorHandler>) -> Self {
        Self {
            handler,
            sources: Vec::new(),
        }
    }

    /// Registers a source, builder-style.
    #[must_use]
    pub fn register(mut self, spec: SourceSpec, collector: Arc<dyn Collector>) -> Self {
        let collector = SafeCollector::new(collector, Arc::clone(&self.handler));
        self.sources.push(RegisteredSource { spec, collector });
        self
    }

    /// Returns the number of registered sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Collects from every source concurrently and merges the results.
    ///
    /// Never fails: missing sources show up only as absent profiles and
    /// a lower quality score.
    pub async fn collect_all(&self, key: &str, display_name: &str) -> CompanyIntelligence {
        let fetches = self
            .sources
            .iter()
            .map(|source| source.collector.collect_safely(key));
        let profiles = join_all(fetches).await;

        let mut merged = HashMap::new();
        let mut score = 0.0;
        let mut total_weight = 0.0;

        for (source, profile) in self.sources.iter().zip(profiles) {
            total_weight += source.spec.weight;
            score += source.spec.weight * signal_fraction(&source.spec, &profile);
            if !profile.is_default() {
                merged.insert(source.spec.name.clone(), profile);
            }
        }

        let quality_score = if total_weight > 0.0 {
            (score / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        debug!(key, quality_score, sources = merged.len(), "intelligence collected");

        CompanyIntelligence {
            key: key.to_string(),
            display_name: display_name.to_string(),
            profiles: merged,
            quality_score,
            collected_at: Utc::now(),
        }
    }
}

/// Fraction of a source's weight earned by a profile: 1.0 for the
/// primary signal, 0.5 for any secondary signal, 0.0 otherwise.
fn signal_fraction(spec: &SourceSpec, profile: &Profile) -> f64 {
    if profile.has(&spec.primary_signal) {
        1.0
    } else if spec.secondary_signals.iter().any(|s| profile.has(s)) {
        0.5
    } else {
        0.0
    }
}

/// A pipeline record that can receive collected intelligence.
pub trait EnrichableRecord: Record {
    /// Human-readable name passed to the aggregator.
    fn display_name(&self) -> String;

    /// Attaches the collected intelligence to the record.
    fn attach(&mut self, intelligence: CompanyIntelligence);
}

#[async_trait]
impl<R: EnrichableRecord> RecordProcessor<R> for IntelligenceAggregator {
    async fn process(&self, mut record: R) -> Result<R, CollectError> {
        let intelligence = self
            .collect_all(&record.dedupe_key(), &record.display_name())
            .await;
        record.attach(intelligence);
        Ok(record)
    }
}
