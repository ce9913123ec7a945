//! Never-failing collector adapter.

use super::{Collector, Profile};
use crate::handler::ErrorHandler;
use std::sync::Arc;
use tracing::warn;

/// Adapts a fallible [`Collector`] to "never fails, default on error".
///
/// This is the seam that converts fail-fast-per-service into graceful
/// degradation per record: retries and circuit breaking happen inside
/// [`ErrorHandler::run_protected`], and whatever error finally surfaces
/// (including a breaker rejection) is logged and swallowed in favor of
/// the zero-value [`Profile`].
#[derive(Clone)]
pub struct SafeCollector {
    collector: Arc<dyn Collector>,
    handler: Arc<ErrorHandler>,
}

impl SafeCollector {
    /// Wraps a collector with the given handler.
    #[must_use]
    pub fn new(collector: Arc<dyn Collector>, handler: Arc<ErrorHandler>) -> Self {
        Self { collector, handler }
    }

    /// Returns the wrapped collector's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.collector.name()
    }

    /// Collects a profile, substituting the default on any failure.
    pub async fn collect_safely(&self, key: &str) -> Profile {
        let operation = format!("collect_{}", self.collector.name());
        let service = format!("{}_service", self.collector.name());

        let collector = Arc::clone(&self.collector);
        let owned_key = key.to_string();
        let result = self
            .handler
            .run_protected(&operation, &service, move || {
                let collector = Arc::clone(&collector);
                let key = owned_key.clone();
                async move { collector.collect(&key).await }
            })
            .await;

        match result {
            Ok(profile) => profile,
            Err(error) => {
                warn!(
                    source = self.collector.name(),
                    key,
                    error = %error,
                    "collector failed, substituting default profile"
                );
                Profile::default()
            }
        }
    }
}

impl std::fmt::Debug for SafeCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeCollector")
            .field("collector", &self.collector.name())
            .finish()
    }
}
