//! Telemetry sink trait and implementations.

use super::{Severity, TelemetryEvent};
use tracing::{error, info, warn};

/// Receives telemetry events from the resilience layer.
///
/// Implementations must be cheap and non-blocking: events are recorded
/// from hot paths, including circuit-breaker state transitions.
pub trait TelemetrySink: Send + Sync {
    /// Records a single event. Must never panic.
    fn record(&self, event: &TelemetryEvent);
}

/// A sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTelemetrySink;

impl TelemetrySink for NoOpTelemetrySink {
    fn record(&self, _event: &TelemetryEvent) {
        // Intentionally empty - discards all events
    }
}

/// A sink that logs every event through the tracing framework.
///
/// With the JSON subscriber installed this produces one JSON log line
/// per event, which is the reference wire shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn record(&self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::AttemptFailed { context } => match context.severity {
                Severity::Medium => warn!(
                    operation = context.operation.as_str(),
                    service = context.service.as_str(),
                    attempt = context.attempt,
                    max_attempts = context.max_attempts,
                    error_kind = context.error_kind.as_str(),
                    error_message = context.error_message.as_str(),
                    severity = context.severity.as_str(),
                    will_retry = context.will_retry,
                    "attempt failed"
                ),
                Severity::High | Severity::Critical => error!(
                    operation = context.operation.as_str(),
                    service = context.service.as_str(),
                    attempt = context.attempt,
                    max_attempts = context.max_attempts,
                    error_kind = context.error_kind.as_str(),
                    error_message = context.error_message.as_str(),
                    severity = context.severity.as_str(),
                    will_retry = context.will_retry,
                    "attempt failed"
                ),
            },
            TelemetryEvent::RetrySucceeded {
                operation,
                service,
                attempts,
            } => {
                info!(
                    operation = operation.as_str(),
                    service = service.as_str(),
                    attempts,
                    "operation succeeded after retry"
                );
            }
            TelemetryEvent::BreakerTransition { service, from, to } => {
                warn!(
                    service = service.as_str(),
                    from = from.as_str(),
                    to = to.as_str(),
                    "circuit breaker transition"
                );
            }
        }
    }
}

/// A sink that stores events in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingTelemetrySink {
    events: parking_lot::RwLock<Vec<TelemetryEvent>>,
}

impl CollectingTelemetrySink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns only the breaker transitions, in emission order.
    #[must_use]
    pub fn breaker_transitions(&self) -> Vec<TelemetryEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| matches!(e, TelemetryEvent::BreakerTransition { .. }))
            .cloned()
            .collect()
    }

    /// Returns only the failed attempts for a given operation.
    #[must_use]
    pub fn attempts_for(&self, operation: &str) -> Vec<TelemetryEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| {
                matches!(e, TelemetryEvent::AttemptFailed { context } if context.operation == operation)
            })
            .cloned()
            .collect()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl TelemetrySink for CollectingTelemetrySink {
    fn record(&self, event: &TelemetryEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use crate::errors::ErrorKind;
    use crate::telemetry::OperationContext;

    fn attempt_event(operation: &str) -> TelemetryEvent {
        TelemetryEvent::AttemptFailed {
            context: OperationContext {
                operation: operation.to_string(),
                service: "ads_service".to_string(),
                attempt: 0,
                max_attempts: 4,
                error_kind: ErrorKind::TransientNetwork,
                error_message: "timeout".to_string(),
                severity: Severity::Medium,
                will_retry: true,
            },
        }
    }

    #[test]
    fn test_noop_sink_discards() {
        let sink = NoOpTelemetrySink;
        sink.record(&attempt_event("collect_ads"));
        // Should not panic
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        let sink = TracingTelemetrySink;
        sink.record(&attempt_event("collect_ads"));
        sink.record(&TelemetryEvent::RetrySucceeded {
            operation: "collect_ads".to_string(),
            service: "ads_service".to_string(),
            attempts: 2,
        });
        sink.record(&TelemetryEvent::BreakerTransition {
            service: "ads_service".to_string(),
            from: CircuitState::Closed,
            to: CircuitState::Open,
        });
    }

    #[test]
    fn test_collecting_sink_stores_events() {
        let sink = CollectingTelemetrySink::new();
        assert!(sink.is_empty());

        sink.record(&attempt_event("collect_ads"));
        sink.record(&attempt_event("collect_funding"));
        sink.record(&TelemetryEvent::BreakerTransition {
            service: "ads_service".to_string(),
            from: CircuitState::Closed,
            to: CircuitState::Open,
        });

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.breaker_transitions().len(), 1);
        assert_eq!(sink.attempts_for("collect_ads").len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}
