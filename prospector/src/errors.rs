//! Error types for the prospector collection core.
//!
//! Every error carries a machine-readable [`ErrorKind`] (and, where
//! applicable, an upstream status code) so retry decisions are pure
//! functions of data rather than of type hierarchies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable classification of a collection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection or timeout failure; retryable by default.
    TransientNetwork,
    /// Explicit backoff signal from an upstream service; always retryable.
    RateLimited,
    /// 5xx-equivalent upstream failure; retryable if the status is configured.
    UpstreamServer,
    /// Caller data is malformed; never retryable.
    Validation,
    /// A raw row could not be parsed; never retryable.
    Parse,
    /// The circuit breaker rejected the call; never retried, surfaced as-is.
    CircuitOpen,
    /// Unclassified failure; not retryable by default.
    Other,
}

impl ErrorKind {
    /// Returns the snake_case name used in log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient_network",
            Self::RateLimited => "rate_limited",
            Self::UpstreamServer => "upstream_server",
            Self::Validation => "validation",
            Self::Parse => "parse",
            Self::CircuitOpen => "circuit_open",
            Self::Other => "other",
        }
    }
}

/// Errors produced while collecting or processing a single record.
#[derive(Debug, Clone, Error)]
pub enum CollectError {
    /// Connection-level failure talking to an external source.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// An upstream service asked us to back off.
    #[error("rate limited by '{service}'")]
    RateLimited {
        /// The service that rejected the call.
        service: String,
        /// Suggested wait before retrying, if the service provided one.
        retry_after_ms: Option<u64>,
    },

    /// The upstream service answered with a server-side error.
    #[error("upstream server error (status {status}): {message}")]
    UpstreamServer {
        /// HTTP-like status code reported by the upstream.
        status: u16,
        /// Upstream error description.
        message: String,
    },

    /// The request itself was malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// A raw row could not be turned into a record.
    #[error("parse error at row {row}: {message}")]
    Parse {
        /// 1-based index of the offending row.
        row: usize,
        /// What went wrong.
        message: String,
    },

    /// The circuit breaker for a service rejected the call without
    /// attempting it.
    #[error("circuit open for service '{service}'")]
    CircuitOpen {
        /// The guarded service name.
        service: String,
    },

    /// Anything that does not fit the taxonomy above.
    #[error("{0}")]
    Other(String),
}

impl CollectError {
    /// Creates a transient network error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientNetwork(message.into())
    }

    /// Creates a rate-limit error without a retry-after hint.
    #[must_use]
    pub fn rate_limited(service: impl Into<String>) -> Self {
        Self::RateLimited {
            service: service.into(),
            retry_after_ms: None,
        }
    }

    /// Creates an upstream server error.
    #[must_use]
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::UpstreamServer {
            status,
            message: message.into(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a parse error for the given 1-based row index.
    #[must_use]
    pub fn parse(row: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            row,
            message: message.into(),
        }
    }

    /// Returns the machine-readable kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientNetwork(_) => ErrorKind::TransientNetwork,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::UpstreamServer { .. } => ErrorKind::UpstreamServer,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Returns the upstream status code, if this error carries one.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::UpstreamServer { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised by a row source itself.
///
/// These are the only failures fatal to a whole ingestion run.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be opened at all.
    #[error("failed to open source: {0}")]
    Open(String),

    /// A row could not be read mid-stream.
    #[error("failed to read row: {0}")]
    Read(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The fatal error surface of [`ingest`](crate::pipeline::BatchIngestionPipeline::ingest).
///
/// Row-level and batch-level failures are absorbed into
/// [`ProcessingStats`](crate::pipeline::ProcessingStats) instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The row source failed to open or read.
    #[error("source error: {0}")]
    Source(#[from] SourceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            CollectError::transient("timeout").kind(),
            ErrorKind::TransientNetwork
        );
        assert_eq!(
            CollectError::rate_limited("ads_service").kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            CollectError::upstream(503, "unavailable").kind(),
            ErrorKind::UpstreamServer
        );
        assert_eq!(
            CollectError::validation("bad key").kind(),
            ErrorKind::Validation
        );
        assert_eq!(CollectError::parse(7, "missing domain").kind(), ErrorKind::Parse);
        assert_eq!(
            CollectError::CircuitOpen {
                service: "ads_service".to_string()
            }
            .kind(),
            ErrorKind::CircuitOpen
        );
    }

    #[test]
    fn test_status_code_only_on_upstream() {
        assert_eq!(CollectError::upstream(502, "bad gateway").status_code(), Some(502));
        assert_eq!(CollectError::transient("timeout").status_code(), None);
        assert_eq!(CollectError::rate_limited("x").status_code(), None);
    }

    #[test]
    fn test_display_messages() {
        let err = CollectError::parse(3, "missing domain");
        assert_eq!(err.to_string(), "parse error at row 3: missing domain");

        let err = CollectError::CircuitOpen {
            service: "funding_service".to_string(),
        };
        assert!(err.to_string().contains("funding_service"));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::TransientNetwork).unwrap();
        assert_eq!(json, "\"transient_network\"");
    }

    #[test]
    fn test_pipeline_error_from_source() {
        let source_err = SourceError::Open("no such file".to_string());
        let pipeline_err = PipelineError::from(source_err);
        assert!(pipeline_err.to_string().contains("failed to open source"));
    }
}
