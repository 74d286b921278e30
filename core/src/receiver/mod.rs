//! Correlation receiver
//!
//! An HTTP listener that accepts OTLP/HTTP protobuf trace batches forwarded
//! by the backend under test. It reads `service.name` from every resource,
//! maps it to a worker ID and notifies that worker through the pool.
//! Any path is accepted, so the backend can be pointed at the receiver
//! without path configuration.

mod correlation;

pub use correlation::{CorrelationSummary, Correlator};

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use prost::Message;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::BenchResult;
use crate::otlp::proto::ExportTraceServiceRequest;
use crate::otlp::TRACES_PATH;
use crate::traits::Notifier;

#[derive(Clone)]
struct ReceiverState {
    correlator: Arc<Correlator>,
    notifier: Arc<dyn Notifier>,
}

async fn receive_traces(State(state): State<ReceiverState>, body: Bytes) -> StatusCode {
    let request = match ExportTraceServiceRequest::decode(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Could not decode trace batch");
            return StatusCode::BAD_REQUEST;
        }
    };

    let summary = state.correlator.correlate(&request, state.notifier.as_ref());
    tracing::trace!(
        notified = summary.notified,
        skipped = summary.skipped,
        failed = summary.failed,
        "Correlated trace batch"
    );
    StatusCode::OK
}

/// Router serving the receiver endpoint on `/v1/traces` and every other path
///
/// Batch size is unlimited: a rejected batch would turn every trace in it
/// into a receive timeout.
pub fn router(correlator: Arc<Correlator>, notifier: Arc<dyn Notifier>) -> Router {
    Router::new()
        .route(TRACES_PATH, post(receive_traces))
        .fallback(receive_traces)
        .layer(DefaultBodyLimit::disable())
        .with_state(ReceiverState {
            correlator,
            notifier,
        })
}

/// Background HTTP listener for one pool
pub struct Receiver {
    correlator: Arc<Correlator>,
    address: String,
    local_addr: OnceLock<SocketAddr>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Receiver {
    /// Create a receiver for `pool` that will listen on `address`
    pub fn new(pool: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            correlator: Arc::new(Correlator::new(pool)),
            address: address.into(),
            local_addr: OnceLock::new(),
            shutdown: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Configured listen address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Bound address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Bind the listener and serve it in the background
    ///
    /// Calling `start` again while serving returns the bound address.
    pub async fn start(&self, notifier: Arc<dyn Notifier>) -> BenchResult<SocketAddr> {
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }

        let listener = TcpListener::bind(&self.address).await?;
        let addr = listener.local_addr()?;
        let _ = self.local_addr.set(addr);

        let app = router(Arc::clone(&self.correlator), notifier);
        let shutdown = self.shutdown.clone();
        let pool = self.correlator.pool().to_string();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            });
            if let Err(e) = server.await {
                tracing::error!(pool = %pool, error = %e, "Receiver stopped with error");
            }
        });
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        tracing::info!(pool = %self.correlator.pool(), %addr, "Receiver listening");
        Ok(addr)
    }

    /// Stop accepting connections and wait up to `grace` for in-flight requests
    ///
    /// The serving task is aborted if it does not finish in time.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutdown.cancel();
        let handle = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(mut handle) = handle {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                tracing::warn!(
                    pool = %self.correlator.pool(),
                    grace_ms = grace.as_millis() as u64,
                    "Receiver did not drain in time, aborting"
                );
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("pool", &self.correlator.pool())
            .field("address", &self.address)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}
