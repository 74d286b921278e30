//! Builder pattern for Worker construction

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use crate::channel::MailboxReceiver;
use crate::config::WorkerConfig;
use crate::error::{BenchError, BenchResult};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::result_log::ResultLog;
use crate::traits::TraceExporter;

use super::executor::Worker;

/// Builder for creating Worker instances
///
/// # Example
/// ```ignore
/// let (tx, rx) = mailbox();
/// let worker = WorkerBuilder::new("plan-a", 1)
///     .config(config)
///     .exporter(exporter)
///     .mailbox(rx)
///     .cancel_token(token.clone())
///     .result_log(log)
///     .build()?;
/// ```
pub struct WorkerBuilder {
    id: u64,
    pool: String,
    config: Option<Arc<WorkerConfig>>,
    exporter: Option<Arc<dyn TraceExporter>>,
    mailbox: Option<MailboxReceiver>,
    cancel: Option<CancellationToken>,
    metrics: Option<Arc<dyn MetricsSink>>,
    log: Option<Arc<ResultLog>>,
    errors: Option<Arc<AtomicUsize>>,
    seed: Option<u64>,
}

impl WorkerBuilder {
    /// Create a new builder for worker `id` of pool `pool`
    pub fn new(pool: impl Into<String>, id: u64) -> Self {
        Self {
            id,
            pool: pool.into(),
            config: None,
            exporter: None,
            mailbox: None,
            cancel: None,
            metrics: None,
            log: None,
            errors: None,
            seed: None,
        }
    }

    /// Set the worker configuration
    pub fn config(mut self, config: Arc<WorkerConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the trace exporter
    pub fn exporter(mut self, exporter: Arc<dyn TraceExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Set the receiving half of the notification mailbox
    pub fn mailbox(mut self, mailbox: MailboxReceiver) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// Set the pool cancellation token
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set the metrics sink (defaults to [`NoopMetrics`])
    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the result log
    pub fn result_log(mut self, log: Arc<ResultLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Share a pool-wide error counter (defaults to a private one)
    pub fn error_counter(mut self, errors: Arc<AtomicUsize>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Seed the random generator for reproducible trace shapes
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Build the Worker
    ///
    /// # Errors
    /// Returns an error if any required field is missing.
    pub fn build(self) -> BenchResult<Worker> {
        let config = self.config.ok_or(BenchError::missing_config("config"))?;
        let exporter = self
            .exporter
            .ok_or(BenchError::missing_config("exporter"))?;
        let mailbox = self.mailbox.ok_or(BenchError::missing_config("mailbox"))?;
        let cancel = self
            .cancel
            .ok_or(BenchError::missing_config("cancel_token"))?;
        let log = self.log.ok_or(BenchError::missing_config("result_log"))?;

        let metrics = self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics));
        let errors = self.errors.unwrap_or_default();
        let rng = match self.seed {
            // Mix in the ID so seeded workers of one pool still differ
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(self.id)),
            None => StdRng::from_entropy(),
        };

        Ok(Worker::new(
            self.id, self.pool, config, exporter, mailbox, cancel, metrics, log, errors, rng,
        ))
    }
}
