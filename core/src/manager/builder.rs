//! Builder pattern for Manager construction

use std::sync::Arc;
use std::time::Duration;

use crate::error::{BenchError, BenchResult};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::result_log::ResultLog;
use crate::traits::TraceExporter;

use super::executor::Manager;

/// Default wait after cancellation for final result lines
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(1);

/// Default deadline for the receiver to finish in-flight requests
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Builder for creating a Manager
///
/// # Example
///
/// ```ignore
/// let manager = ManagerBuilder::new("checkout-plan")
///     .result_log(log)
///     .metrics(metrics)
///     .build()?;
/// manager.configure(worker_config)?;
/// manager.start().await?;
/// manager.add_workers(10)?;
/// ```
pub struct ManagerBuilder {
    name: String,
    metrics: Arc<dyn MetricsSink>,
    result_log: Option<Arc<ResultLog>>,
    exporter: Option<Arc<dyn TraceExporter>>,
    drain_interval: Duration,
    shutdown_grace: Duration,
    seed: Option<u64>,
}

impl ManagerBuilder {
    /// Create a builder for the pool `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metrics: Arc::new(NoopMetrics),
            result_log: None,
            exporter: None,
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            seed: None,
        }
    }

    /// Set the metrics sink
    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the result log every worker appends to
    pub fn result_log(mut self, log: Arc<ResultLog>) -> Self {
        self.result_log = Some(log);
        self
    }

    /// Use `exporter` instead of an OTLP exporter built from the target
    pub fn exporter(mut self, exporter: Arc<dyn TraceExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Set the wait between cancellation and collecting workers
    pub fn drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Set the receiver shutdown deadline
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Seed worker randomness for reproducible traces
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Build the manager
    ///
    /// # Errors
    ///
    /// Returns an error if the result log is not set.
    pub fn build(self) -> BenchResult<Manager> {
        let result_log = self
            .result_log
            .ok_or_else(|| BenchError::missing_config("result log"))?;

        Ok(Manager::new(
            self.name,
            self.metrics,
            result_log,
            self.exporter,
            self.drain_interval,
            self.shutdown_grace,
            self.seed,
        ))
    }
}
