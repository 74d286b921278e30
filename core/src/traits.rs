//! Core traits at the seams between workers, the pool manager and transports
//!
//! Workers only see a [`TraceExporter`]; the scaling engine only sees a
//! [`WorkerPool`]; the correlation receiver only sees a [`Notifier`]. Tests
//! substitute any of them with in-memory mocks.

use async_trait::async_trait;

use crate::error::BenchResult;
use crate::trace::SyntheticTrace;

// ============================================================================
// Trace Exporter Trait
// ============================================================================

/// Sends one finished synthetic trace to the target backend
///
/// Implementations must be shareable across all workers of a pool. The
/// worker bounds each call with its send timeout, so implementations do not
/// need their own deadline.
#[async_trait]
pub trait TraceExporter: Send + Sync {
    /// Exporter identifier used in logs (e.g., "otlp-http")
    fn name(&self) -> &str;

    /// Export the trace and return once the backend has accepted it
    async fn export(&self, trace: &SyntheticTrace) -> Result<(), ExportError>;
}

/// Transport failures surfaced by a [`TraceExporter`]
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// HTTP/network error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("rejected with status {status}")]
    Rejected {
        /// HTTP status code
        status: u16,
    },

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl ExportError {
    /// Whether the transport gave up waiting on the backend
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

// ============================================================================
// Pool seams
// ============================================================================

/// Something that can grow by `count` workers
///
/// Implemented by the pool manager and driven by the scaling engine.
pub trait WorkerPool: Send + Sync {
    /// Create, register and launch `count` new workers
    fn add_workers(&self, count: usize) -> BenchResult<()>;
}

/// Delivers a confirmation to the worker that emitted a trace
///
/// Implemented by the pool manager and driven by the correlation receiver.
/// Must never block.
pub trait Notifier: Send + Sync {
    /// Wake worker `worker_id`
    fn notify(&self, worker_id: u64) -> BenchResult<()>;
}
