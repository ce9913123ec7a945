//! Structured telemetry for the resilience layer.
//!
//! Every retry attempt, circuit-breaker transition, and final failure is
//! reported to an injected [`TelemetrySink`]. There is no global sink
//! state: the handler and pipeline each receive their sink at
//! construction time.

mod sink;

pub use sink::{CollectingTelemetrySink, NoOpTelemetrySink, TelemetrySink, TracingTelemetrySink};

use crate::breaker::CircuitState;
use crate::errors::ErrorKind;
use serde::{Deserialize, Serialize};

/// Severity attached to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The attempt failed but a retry will follow.
    Medium,
    /// Retries are exhausted or the circuit is open.
    High,
    /// The error can never succeed on retry (malformed caller data).
    Critical,
}

impl Severity {
    /// Returns the snake_case name used in log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Snapshot of one protected attempt.
///
/// Created fresh per attempt inside `run_protected` and discarded after
/// it has been reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Logical operation name, e.g. `collect_ads`.
    pub operation: String,
    /// Guarded service name, e.g. `ads_service`.
    pub service: String,
    /// 0-indexed attempt number.
    pub attempt: u32,
    /// Total attempts the policy allows.
    pub max_attempts: u32,
    /// Machine-readable kind of the failure.
    pub error_kind: ErrorKind,
    /// Human-readable failure message.
    pub error_message: String,
    /// Classified severity of the failure.
    pub severity: Severity,
    /// Whether the handler will retry after this attempt.
    pub will_retry: bool,
}

/// Events emitted by the resilience layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// A protected attempt failed.
    AttemptFailed {
        /// Full context of the failed attempt.
        context: OperationContext,
    },
    /// An operation eventually succeeded after at least one retry.
    RetrySucceeded {
        /// Logical operation name.
        operation: String,
        /// Guarded service name.
        service: String,
        /// Number of attempts it took, including the successful one.
        attempts: u32,
    },
    /// A circuit breaker changed state.
    BreakerTransition {
        /// Guarded service name.
        service: String,
        /// Previous state.
        from: CircuitState,
        /// New state.
        to: CircuitState,
    },
}

/// Installs a JSON-per-line tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_json_logging() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_names() {
        assert_eq!(Severity::Medium.as_str(), "medium");
        assert_eq!(Severity::High.as_str(), "high");
        assert_eq!(Severity::Critical.as_str(), "critical");
    }

    #[test]
    fn test_operation_context_round_trips() {
        let context = OperationContext {
            operation: "collect_ads".to_string(),
            service: "ads_service".to_string(),
            attempt: 1,
            max_attempts: 4,
            error_kind: ErrorKind::TransientNetwork,
            error_message: "timeout".to_string(),
            severity: Severity::Medium,
            will_retry: true,
        };

        let json = serde_json::to_string(&context).unwrap();
        let back: OperationContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back.operation, "collect_ads");
        assert_eq!(back.error_kind, ErrorKind::TransientNetwork);
        assert!(back.will_retry);
    }
}
