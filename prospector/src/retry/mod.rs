//! Retry policy with exponential backoff and jitter.
//!
//! The policy is pure configuration: it computes delays and answers
//! retry questions but holds no per-call state. One policy instance is
//! shared across all operations of an
//! [`ErrorHandler`](crate::handler::ErrorHandler).

use crate::errors::{CollectError, ErrorKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt.
    pub max_retries: u32,
    /// First backoff delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Backoff ceiling in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
    /// Whether to randomize delays to avoid synchronized retry storms.
    pub jitter: bool,
    /// Error kinds that are retryable regardless of status code.
    pub retryable_kinds: HashSet<ErrorKind>,
    /// Upstream status codes that are retryable.
    pub retryable_status_codes: HashSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_factor: 2.0,
            jitter: true,
            retryable_kinds: HashSet::from([ErrorKind::TransientNetwork]),
            retryable_status_codes: HashSet::from([429, 500, 502, 503, 504]),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay_ms(mut self, delay: u64) -> Self {
        self.initial_delay_ms = delay;
        self
    }

    /// Sets the delay ceiling.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replaces the set of retryable error kinds.
    #[must_use]
    pub fn with_retryable_kinds(mut self, kinds: HashSet<ErrorKind>) -> Self {
        self.retryable_kinds = kinds;
        self
    }

    /// Replaces the set of retryable status codes.
    #[must_use]
    pub fn with_retryable_status_codes(mut self, codes: HashSet<u16>) -> Self {
        self.retryable_status_codes = codes;
        self
    }

    /// Returns the total number of attempts the policy allows.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Calculates the backoff delay for a 0-indexed attempt.
    ///
    /// `delay = min(initial * factor^attempt, max)`, multiplied by a
    /// uniform random factor in `[0.5, 1.0)` when jitter is enabled.
    /// Deterministic when jitter is disabled.
    #[must_use]
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let raw = (self.initial_delay_ms as f64) * self.backoff_factor.powi(attempt as i32);
        let capped = raw.min(self.max_delay_ms as f64);

        let millis = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..1.0)
        } else {
            capped
        };

        Duration::from_millis(millis as u64)
    }

    /// Decides whether an error at a 0-indexed attempt should be retried.
    ///
    /// Validation, parse, and circuit-open errors short-circuit to false
    /// regardless of the attempt count.
    #[must_use]
    pub fn should_retry(&self, error: &CollectError, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }

        let kind = error.kind();
        match kind {
            ErrorKind::RateLimited => true,
            ErrorKind::Validation | ErrorKind::Parse | ErrorKind::CircuitOpen => false,
            _ => {
                self.retryable_kinds.contains(&kind)
                    || error
                        .status_code()
                        .is_some_and(|status| self.retryable_status_codes.contains(&status))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic_policy() -> RetryPolicy {
        RetryPolicy::new()
            .with_initial_delay_ms(100)
            .with_max_delay_ms(5000)
            .with_backoff_factor(2.0)
            .with_jitter(false)
    }

    #[test]
    fn test_compute_delay_exact_without_jitter() {
        let policy = deterministic_policy();

        assert_eq!(policy.compute_delay(0), Duration::from_millis(100));
        assert_eq!(policy.compute_delay(1), Duration::from_millis(200));
        assert_eq!(policy.compute_delay(2), Duration::from_millis(400));
        assert_eq!(policy.compute_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_compute_delay_capped_at_max() {
        let policy = deterministic_policy();

        // 100 * 2^10 = 102400, well above the 5000ms ceiling
        assert_eq!(policy.compute_delay(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_compute_delay_jitter_bounds() {
        let policy = RetryPolicy::new()
            .with_initial_delay_ms(1000)
            .with_backoff_factor(1.0)
            .with_jitter(true);

        for _ in 0..100 {
            let delay = policy.compute_delay(0);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay < Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_should_retry_transient_until_exhausted() {
        let policy = RetryPolicy::new().with_max_retries(2);
        let error = CollectError::transient("connection reset");

        assert!(policy.should_retry(&error, 0));
        assert!(policy.should_retry(&error, 1));
        assert!(!policy.should_retry(&error, 2));
    }

    #[test]
    fn test_should_retry_rate_limit_always_retryable() {
        let policy = RetryPolicy::new()
            .with_max_retries(3)
            .with_retryable_kinds(HashSet::new())
            .with_retryable_status_codes(HashSet::new());
        let error = CollectError::rate_limited("ads_service");

        assert!(policy.should_retry(&error, 0));
    }

    #[test]
    fn test_should_retry_status_code_driven() {
        let policy = RetryPolicy::new().with_retryable_status_codes(HashSet::from([503]));

        assert!(policy.should_retry(&CollectError::upstream(503, "unavailable"), 0));
        assert!(!policy.should_retry(&CollectError::upstream(501, "not implemented"), 0));
    }

    #[test]
    fn test_should_retry_validation_short_circuits() {
        let policy = RetryPolicy::new().with_max_retries(10);

        assert!(!policy.should_retry(&CollectError::validation("bad key"), 0));
        assert!(!policy.should_retry(&CollectError::parse(1, "missing field"), 0));
    }

    #[test]
    fn test_should_retry_circuit_open_never() {
        let policy = RetryPolicy::new().with_max_retries(10);
        let error = CollectError::CircuitOpen {
            service: "ads_service".to_string(),
        };

        assert!(!policy.should_retry(&error, 0));
    }

    #[test]
    fn test_max_attempts() {
        assert_eq!(RetryPolicy::new().with_max_retries(3).max_attempts(), 4);
        assert_eq!(RetryPolicy::new().with_max_retries(0).max_attempts(), 1);
    }

    #[test]
    fn test_policy_serde_round_trip() {
        let policy = deterministic_policy();
        let json = serde_json::to_string(&policy).unwrap();
        let back: RetryPolicy = serde_json::from_str(&json).unwrap();

        assert_eq!(back.initial_delay_ms, 100);
        assert_eq!(back.max_delay_ms, 5000);
        assert!(!back.jitter);
    }
}
