//! Protected execution: retries composed with per-service circuit breakers.
//!
//! [`ErrorHandler::run_protected`] is the single entry point every
//! external call goes through. It owns a lazily-populated registry of
//! circuit breakers, one per service name, shared by all concurrent
//! callers of the same handler instance.

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::errors::{CollectError, ErrorKind};
use crate::retry::RetryPolicy;
use crate::telemetry::{
    NoOpTelemetrySink, OperationContext, Severity, TelemetryEvent, TelemetrySink,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Combined tunables for the resilience layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Retry and backoff settings.
    pub retry: RetryPolicy,
    /// Circuit breaker settings applied to every service.
    pub breaker: CircuitBreakerConfig,
}

/// Composes a [`RetryPolicy`] with a registry of [`CircuitBreaker`]s.
///
/// Breakers are created lazily and cached by service name, so no two
/// call paths ever observe divergent failure counts for the same
/// service within one handler instance.
pub struct ErrorHandler {
    retry_policy: RetryPolicy,
    breaker_config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    sink: Arc<dyn TelemetrySink>,
}

impl ErrorHandler {
    /// Creates a handler with the given retry and breaker settings.
    #[must_use]
    pub fn new(retry_policy: RetryPolicy, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            retry_policy,
            breaker_config,
            breakers: DashMap::new(),
            sink: Arc::new(NoOpTelemetrySink),
        }
    }

    /// Creates a handler from a combined config.
    #[must_use]
    pub fn from_config(config: ResilienceConfig) -> Self {
        Self::new(config.retry, config.breaker)
    }

    /// Attaches a telemetry sink.
    ///
    /// Must be called before any breakers are created: breakers capture
    /// the sink at creation time.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Resolves (or lazily creates) the breaker for a service.
    #[must_use]
    pub fn breaker_for(&self, service: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_sink(
                    service,
                    self.breaker_config.clone(),
                    self.sink.clone(),
                ))
            })
            .value()
            .clone()
    }

    /// Runs a fallible async operation with retries behind the
    /// service's circuit breaker.
    ///
    /// Guarantees on error return: either the circuit for `service` is
    /// now open, or retries were exhausted, or the error was never
    /// retryable. Callers must treat any returned error as final.
    pub async fn run_protected<T, F, Fut>(
        &self,
        operation: &str,
        service: &str,
        mut f: F,
    ) -> Result<T, CollectError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollectError>>,
    {
        let breaker = self.breaker_for(service);
        let max_attempts = self.retry_policy.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            match breaker.call(&mut f).await {
                Ok(value) => {
                    if attempt > 0 {
                        self.sink.record(&TelemetryEvent::RetrySucceeded {
                            operation: operation.to_string(),
                            service: service.to_string(),
                            attempts: attempt + 1,
                        });
                        info!(operation, service, attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    // Breaker rejections fast-fail: no retry, no backoff.
                    if error.kind() == ErrorKind::CircuitOpen {
                        self.report(operation, service, attempt, max_attempts, &error, Severity::High, false);
                        return Err(error);
                    }

                    let will_retry = self.retry_policy.should_retry(&error, attempt);
                    let severity = if will_retry {
                        Severity::Medium
                    } else if matches!(error.kind(), ErrorKind::Validation | ErrorKind::Parse) {
                        Severity::Critical
                    } else {
                        Severity::High
                    };
                    self.report(operation, service, attempt, max_attempts, &error, severity, will_retry);

                    if !will_retry {
                        return Err(error);
                    }

                    tokio::time::sleep(self.retry_policy.compute_delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    fn report(
        &self,
        operation: &str,
        service: &str,
        attempt: u32,
        max_attempts: u32,
        error: &CollectError,
        severity: Severity,
        will_retry: bool,
    ) {
        let context = OperationContext {
            operation: operation.to_string(),
            service: service.to_string(),
            attempt,
            max_attempts,
            error_kind: error.kind(),
            error_message: error.to_string(),
            severity,
            will_retry,
        };
        self.sink.record(&TelemetryEvent::AttemptFailed { context });
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("retry_policy", &self.retry_policy)
            .field("breaker_config", &self.breaker_config)
            .field("services", &self.breakers.len())
            .finish()
    }
}
