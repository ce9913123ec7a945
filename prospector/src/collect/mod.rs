//! Collector contract and profile type.
//!
//! External intelligence sources (ad networks, funding and hiring data
//! providers, technology detection services) are opaque to the core:
//! anything implementing [`Collector`] can be plugged in. The core never
//! inspects concrete collector types.

mod safe;

pub use safe::SafeCollector;

use crate::errors::CollectError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Signals returned by one external source for one key.
///
/// A profile with no signals is the "default" value that
/// [`SafeCollector`] substitutes when a source fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Signal name to value. Values are source-defined JSON.
    pub signals: HashMap<String, serde_json::Value>,
}

impl Profile {
    /// Creates an empty profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a signal, builder-style.
    #[must_use]
    pub fn with_signal(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.signals.insert(name.into(), value.into());
        self
    }

    /// Inserts a signal.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.signals.insert(name.into(), value.into());
    }

    /// Returns true if the named signal is present.
    #[must_use]
    pub fn has(&self, signal: &str) -> bool {
        self.signals.contains_key(signal)
    }

    /// Returns true if this is the zero-value profile.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.signals.is_empty()
    }
}

/// A single external intelligence source.
///
/// Implementations must be idempotent and safe to call concurrently for
/// different keys, and safe to call repeatedly for the same key: the
/// resilience layer retries freely.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short source name, used to derive operation and service labels.
    fn name(&self) -> &str;

    /// Fetches the profile for one key.
    async fn collect(&self, key: &str) -> Result<Profile, CollectError>;
}
