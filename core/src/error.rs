//! Error types for tracebench-core

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::benchmark::BenchmarkState;
use crate::config::ConfigError;
use crate::traits::ExportError;

/// Core error type
#[derive(Error, Debug)]
pub enum BenchError {
    /// A required piece of configuration was never supplied
    #[error("configuration missing: {0}")]
    ConfigurationMissing(&'static str),

    /// Configuration was supplied but failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// A lifecycle operation was attempted from a state that does not allow it
    #[error("cannot {operation} benchmark: {state}")]
    InvalidTransition {
        /// The rejected operation
        operation: &'static str,
        /// State the benchmark was in
        state: BenchmarkState,
    },

    /// The trace could not be flushed within the send timeout
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    /// Flushing the trace failed
    #[error("send failed: {0}")]
    SendError(#[from] ExportError),

    /// No confirmation arrived within the receive timeout
    #[error("receive timed out after {0:?}")]
    ReceiveTimeout(Duration),

    /// The worker was cancelled through the pool token
    #[error("worker cancelled")]
    Cancelled,

    /// No worker with this ID exists (or it has already exited)
    #[error("worker {0} not found")]
    WorkerNotFound(u64),

    /// The pool manager has been stopped and is inert
    #[error("manager stopped")]
    ManagerStopped,

    /// No benchmark is registered under this name
    #[error("benchmark {0:?} not found")]
    BenchmarkNotFound(String),

    /// An inbound payload did not identify one of this pool's workers
    #[error("correlation skipped: {0}")]
    CorrelationParseSkip(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Shorthand for a missing builder/configuration field
    pub fn missing_config(what: &'static str) -> Self {
        BenchError::ConfigurationMissing(what)
    }

    /// Shorthand for a lifecycle guard violation
    pub fn invalid_transition(operation: &'static str, state: BenchmarkState) -> Self {
        BenchError::InvalidTransition { operation, state }
    }

    /// Metrics classification for per-iteration worker failures
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            BenchError::SendTimeout(_) => Some(ErrorKind::SendTimeout),
            BenchError::SendError(_) => Some(ErrorKind::SendError),
            BenchError::ReceiveTimeout(_) => Some(ErrorKind::ReceiveTimeout),
            _ => None,
        }
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Classification of worker failures, used as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Flush did not finish within the send timeout
    SendTimeout,
    /// Flush failed
    SendError,
    /// Confirmation did not arrive within the receive timeout
    ReceiveTimeout,
    /// The worker loop itself returned and had to be restarted
    Restart,
}

impl ErrorKind {
    /// Label value used for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SendTimeout => "send_timeout",
            ErrorKind::SendError => "send_error",
            ErrorKind::ReceiveTimeout => "receive_timeout",
            ErrorKind::Restart => "restart",
        }
    }

    /// All kinds, in label order
    pub fn all() -> &'static [ErrorKind] {
        &[
            ErrorKind::SendTimeout,
            ErrorKind::SendError,
            ErrorKind::ReceiveTimeout,
            ErrorKind::Restart,
        ]
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(
            BenchError::SendTimeout(Duration::from_secs(1)).kind(),
            Some(ErrorKind::SendTimeout)
        );
        assert_eq!(
            BenchError::ReceiveTimeout(Duration::from_secs(1)).kind(),
            Some(ErrorKind::ReceiveTimeout)
        );
        assert_eq!(
            BenchError::SendError(ExportError::Rejected { status: 503 }).kind(),
            Some(ErrorKind::SendError)
        );
        assert_eq!(BenchError::Cancelled.kind(), None);
        assert_eq!(BenchError::WorkerNotFound(3).kind(), None);
    }

    #[test]
    fn test_invalid_transition_message_names_guard() {
        let err = BenchError::invalid_transition("stop", BenchmarkState::Configured);
        assert_eq!(err.to_string(), "cannot stop benchmark: configured");
    }

    #[test]
    fn test_error_kind_labels() {
        let labels: Vec<&str> = ErrorKind::all().iter().map(|k| k.as_str()).collect();
        assert_eq!(
            labels,
            vec!["send_timeout", "send_error", "receive_timeout", "restart"]
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::ReceiveTimeout).unwrap(),
            "\"receive_timeout\""
        );
    }
}
