//! Error taxonomy for the submission pipeline
//!
//! Every failure a caller can see is classified here as transient (worth a
//! bounded retry), permanent (reject immediately), or resource exhaustion
//! (shed load). Component-local error types convert into `PipelineError` at
//! the orchestrator boundary.

use thiserror::Error;

use crate::connection::TransportError;
use crate::signing::SignError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The connection pool had no healthy endpoint to hand out
    #[error("no connection available: {0}")]
    ConnectionUnavailable(String),

    /// A submission attempt failed at the transport level
    #[error("transport error ({endpoint}): {source}")]
    Transport {
        endpoint: String,
        source: TransportError,
    },

    /// Signing failed, timed out, or was shed by the pool
    #[error("signing failed: {0}")]
    Signing(#[from] SignError),

    /// The request itself is malformed and will never succeed
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// The congestion signal was outside the representable range
    #[error("invalid congestion sample: {0}")]
    InvalidCongestion(f64),

    /// Transient failures persisted past the retry budget
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Internal invariant violation; indicates a bug
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether retrying the whole submission might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionUnavailable(_) => true,
            Self::Transport { source, .. } => source.is_transient(),
            Self::Signing(err) => matches!(err, SignError::Timeout(_)),
            Self::RetriesExhausted { .. } => true,

            Self::InvalidTransaction(_) => false,
            Self::InvalidCongestion(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Error category for metrics and logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConnectionUnavailable(_) => "connection",
            Self::Transport { .. } => "transport",
            Self::Signing(SignError::PoolSaturated { .. }) => "backpressure",
            Self::Signing(_) => "signing",
            Self::InvalidTransaction(_) => "validation",
            Self::InvalidCongestion(_) => "validation",
            Self::RetriesExhausted { .. } => "retries",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(PipelineError::ConnectionUnavailable("down".into()).is_retryable());
        assert!(PipelineError::Signing(SignError::Timeout(Duration::from_secs(1))).is_retryable());
        assert!(PipelineError::Transport {
            endpoint: "http://a".into(),
            source: TransportError::Unreachable("refused".into()),
        }
        .is_retryable());
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!PipelineError::InvalidTransaction("empty payload".into()).is_retryable());
        assert!(!PipelineError::InvalidCongestion(f64::NAN).is_retryable());
        assert!(!PipelineError::Transport {
            endpoint: "http://a".into(),
            source: TransportError::Rejected("400".into()),
        }
        .is_retryable());
    }

    #[test]
    fn saturation_is_its_own_category() {
        let err = PipelineError::Signing(SignError::PoolSaturated { capacity: 8 });
        assert_eq!(err.category(), "backpressure");
        assert!(!err.is_retryable());
    }
}
