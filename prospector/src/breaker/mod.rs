//! Per-service circuit breaker.
//!
//! One breaker guards exactly one named service. State transitions are
//! serialized behind a single mutex; the guarded call itself runs with
//! no lock held, so many callers may be in flight concurrently while
//! counter updates never race.

use crate::errors::{CollectError, ErrorKind};
use crate::telemetry::{NoOpTelemetrySink, TelemetryEvent, TelemetrySink};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The states a breaker moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected without touching the network.
    Open,
    /// A limited number of probe calls are allowed through.
    HalfOpen,
}

impl CircuitState {
    /// Returns the snake_case name used in log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive counted failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a half-open probe.
    pub recovery_timeout_ms: u64,
    /// Successes required in half-open before the circuit closes.
    pub success_threshold: u32,
    /// Error kinds that count toward the failure threshold.
    ///
    /// `None` counts every kind. `CircuitOpen` never counts either way.
    pub counted_kinds: Option<HashSet<ErrorKind>>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
            success_threshold: 2,
            counted_kinds: None,
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the recovery timeout.
    #[must_use]
    pub fn with_recovery_timeout_ms(mut self, timeout: u64) -> Self {
        self.recovery_timeout_ms = timeout;
        self
    }

    /// Sets the success threshold.
    #[must_use]
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Restricts which error kinds count toward the failure threshold.
    #[must_use]
    pub fn with_counted_kinds(mut self, kinds: HashSet<ErrorKind>) -> Self {
        self.counted_kinds = Some(kinds);
        self
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
}

/// Circuit breaker guarding one named service.
///
/// A breaker is a singleton per service for the lifetime of the
/// [`ErrorHandler`](crate::handler::ErrorHandler) that owns it.
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    sink: Arc<dyn TelemetrySink>,
}

impl CircuitBreaker {
    /// Creates a closed breaker for the given service.
    #[must_use]
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_sink(service, config, Arc::new(NoOpTelemetrySink))
    }

    /// Creates a closed breaker that reports transitions to a sink.
    #[must_use]
    pub fn with_sink(
        service: impl Into<String>,
        config: CircuitBreakerConfig,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            service: service.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
            }),
            sink,
        }
    }

    /// Returns the guarded service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Returns the current consecutive failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Runs a call through the breaker.
    ///
    /// In `Open` state the call is rejected with
    /// [`CollectError::CircuitOpen`] without invoking `f`, unless the
    /// recovery timeout has elapsed, in which case the breaker moves to
    /// `HalfOpen` first and the call proceeds as a probe.
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T, CollectError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CollectError>>,
    {
        self.admit()?;

        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(error) => {
                self.on_failure(&error);
                Err(error)
            }
        }
    }

    /// Decides whether a call may proceed, transitioning `Open` to
    /// `HalfOpen` when the recovery timeout has elapsed.
    fn admit(&self) -> Result<(), CollectError> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let recovery = Duration::from_millis(self.config.recovery_timeout_ms);
                let elapsed = inner
                    .last_failure_at
                    .is_some_and(|at| at.elapsed() >= recovery);

                if elapsed {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    Ok(())
                } else {
                    Err(CollectError::CircuitOpen {
                        service: self.service.clone(),
                    })
                }
            }
        }
    }

    /// Returns true if the error counts toward the failure threshold.
    fn counts(&self, error: &CollectError) -> bool {
        if error.kind() == ErrorKind::CircuitOpen {
            return false;
        }
        match &self.config.counted_kinds {
            Some(kinds) => kinds.contains(&error.kind()),
            None => true,
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            // A single success clears the failure streak without
            // requiring full closure. Full reset, not a sliding window.
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            // admit() moves Open to HalfOpen before any call proceeds
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, error: &CollectError) {
        if !self.counts(error) {
            return;
        }

        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.last_failure_at = Some(Instant::now());
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                inner.last_failure_at = Some(Instant::now());
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        self.sink.record(&TelemetryEvent::BreakerTransition {
            service: self.service.clone(),
            from,
            to,
        });
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service", &self.service)
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::CollectingTelemetrySink;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing_call() -> Result<(), CollectError> {
        Err(CollectError::transient("connection reset"))
    }

    fn config(failure_threshold: u32, recovery_timeout_ms: u64, success_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(failure_threshold)
            .with_recovery_timeout_ms(recovery_timeout_ms)
            .with_success_threshold(success_threshold)
    }

    #[tokio::test]
    async fn test_opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new("ads_service", config(3, 60_000, 1));

        for _ in 0..3 {
            let result = breaker.call(|| async { failing_call() }).await;
            assert!(result.is_err());
        }

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let breaker = CircuitBreaker::new("ads_service", config(1, 60_000, 1));
        let _ = breaker.call(|| async { failing_call() }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let result: Result<(), CollectError> = breaker
            .call(|| {
                invoked.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(CollectError::CircuitOpen { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_half_open_probe_after_recovery_timeout() {
        let breaker = CircuitBreaker::new("ads_service", config(1, 0, 1));
        let _ = breaker.call(|| async { failing_call() }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        // Zero recovery timeout: next call probes immediately.
        let invoked = AtomicU32::new(0);
        let result = breaker
            .call(|| {
                invoked.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("ads_service", config(1, 0, 2));
        let _ = breaker.call(|| async { failing_call() }).await;

        // Probe fails: straight back to Open.
        let result = breaker.call(|| async { failing_call() }).await;
        assert!(result.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_half_open_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new("ads_service", config(1, 0, 2));
        let _ = breaker.call(|| async { failing_call() }).await;

        let first = breaker.call(|| async { Ok::<_, CollectError>(1) }).await;
        assert!(first.is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let second = breaker.call(|| async { Ok::<_, CollectError>(2) }).await;
        assert!(second.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_success_resets_failure_streak() {
        let breaker = CircuitBreaker::new("ads_service", config(3, 60_000, 1));

        let _ = breaker.call(|| async { failing_call() }).await;
        let _ = breaker.call(|| async { failing_call() }).await;
        assert_eq!(breaker.failure_count(), 2);

        let _ = breaker.call(|| async { Ok::<_, CollectError>(()) }).await;
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_uncounted_kinds_do_not_trip_breaker() {
        let breaker = CircuitBreaker::new(
            "ads_service",
            config(1, 60_000, 1)
                .with_counted_kinds(HashSet::from([ErrorKind::TransientNetwork])),
        );

        let result = breaker
            .call(|| async { Err::<(), _>(CollectError::validation("bad key")) })
            .await;
        assert!(result.is_err());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_transitions_are_reported() {
        let sink = Arc::new(CollectingTelemetrySink::new());
        let breaker = CircuitBreaker::with_sink("ads_service", config(1, 0, 1), sink.clone());

        let _ = breaker.call(|| async { failing_call() }).await;
        let _ = breaker.call(|| async { Ok::<_, CollectError>(()) }).await;

        // Closed -> Open, Open -> HalfOpen, HalfOpen -> Closed
        assert_eq!(sink.breaker_transitions().len(), 3);
    }
}
