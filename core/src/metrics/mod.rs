//! Metrics collection
//!
//! Workers and the pool manager report through an injected [`MetricsSink`];
//! there are no process-global registries. Every signal is labelled by pool
//! name.
//!
//! - [`NoopMetrics`] discards everything
//! - [`RecordingMetrics`] keeps in-process counters and a latency histogram
//! - [`PrometheusMetrics`] feeds a `prometheus` registry for scraping
//! - [`FanoutMetrics`] forwards to several sinks

mod histogram;
mod recording;
mod registry;

pub use histogram::{LatencyHistogram, LatencyPercentiles};
pub use recording::{MetricsSnapshot, RecordingMetrics};
pub use registry::PrometheusMetrics;

use std::sync::Arc;

use crate::error::ErrorKind;

/// Monotonic counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// A trace was exported successfully
    TracesSent,
    /// A confirmation for a trace reached its worker
    TracesReceived,
    /// A worker iteration failed or a worker had to be restarted
    WorkerErrors(ErrorKind),
}

/// Value distributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distribution {
    /// Send-end to confirmation, in seconds
    RoundTripSeconds,
}

/// Point-in-time values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gauge {
    /// Workers currently running in the pool
    ActiveWorkers,
}

/// Destination for metric updates
pub trait MetricsSink: Send + Sync {
    /// Add one to `counter` for `pool`
    fn increment_counter(&self, counter: Counter, pool: &str);

    /// Record one observation of `distribution` for `pool`
    fn observe_distribution(&self, distribution: Distribution, pool: &str, value: f64);

    /// Set `gauge` for `pool`
    fn set_gauge(&self, gauge: Gauge, pool: &str, value: f64);
}

/// Sink that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment_counter(&self, _counter: Counter, _pool: &str) {}

    fn observe_distribution(&self, _distribution: Distribution, _pool: &str, _value: f64) {}

    fn set_gauge(&self, _gauge: Gauge, _pool: &str, _value: f64) {}
}

/// Sink that forwards every update to each inner sink
#[derive(Default, Clone)]
pub struct FanoutMetrics {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl FanoutMetrics {
    /// Create an empty fanout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of inner sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no inner sinks
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl MetricsSink for FanoutMetrics {
    fn increment_counter(&self, counter: Counter, pool: &str) {
        for sink in &self.sinks {
            sink.increment_counter(counter, pool);
        }
    }

    fn observe_distribution(&self, distribution: Distribution, pool: &str, value: f64) {
        for sink in &self.sinks {
            sink.observe_distribution(distribution, pool, value);
        }
    }

    fn set_gauge(&self, gauge: Gauge, pool: &str, value: f64) {
        for sink in &self.sinks {
            sink.set_gauge(gauge, pool, value);
        }
    }
}

impl std::fmt::Debug for FanoutMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutMetrics")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
