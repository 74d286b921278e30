//! Worker execution loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::channel::MailboxReceiver;
use crate::config::WorkerConfig;
use crate::error::{BenchError, BenchResult, ErrorKind};
use crate::metrics::{Counter, Distribution, MetricsSink};
use crate::result_log::ResultLog;
use crate::traits::TraceExporter;

use super::generator::{random_duration, TraceGenerator};
use super::record::{IterationRecord, WorkerStatus};
use super::stats::WorkerStats;

/// Why [`Worker::run`] returned
#[derive(Debug)]
pub enum WorkerExit {
    /// The pool token fired; the worker must not be restarted
    Cancelled,
    /// The loop broke on an unexpected error; the supervisor restarts it
    Transient(BenchError),
}

/// Result of a single iteration
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// Confirmation arrived `round_trip` after the export finished
    Success {
        /// Send-end to confirmation
        round_trip: Duration,
    },
    /// Export hit the send timeout
    SendTimeout,
    /// Export failed
    SendError(String),
    /// No confirmation within the receive timeout
    ReceiveTimeout,
    /// The pool token fired during the iteration
    Cancelled,
}

enum Wake {
    Cancelled,
    TimedOut,
    Notified,
    Closed,
}

/// One simulated client: generate -> export -> await confirmation -> cooldown -> repeat
///
/// Owned by its supervisor task. The pool manager only keeps the sending
/// half of the worker's mailbox.
pub struct Worker {
    /// Unique worker identifier within the pool
    id: u64,

    /// Pool name, used as the metrics label
    pool: String,

    config: Arc<WorkerConfig>,
    generator: TraceGenerator,
    exporter: Arc<dyn TraceExporter>,
    mailbox: MailboxReceiver,
    cancel: CancellationToken,
    metrics: Arc<dyn MetricsSink>,
    log: Arc<ResultLog>,

    /// Pool-wide error counter
    errors: Arc<AtomicUsize>,

    rng: StdRng,
    record: IterationRecord,
    stats: WorkerStats,
    initialized: bool,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        id: u64,
        pool: String,
        config: Arc<WorkerConfig>,
        exporter: Arc<dyn TraceExporter>,
        mailbox: MailboxReceiver,
        cancel: CancellationToken,
        metrics: Arc<dyn MetricsSink>,
        log: Arc<ResultLog>,
        errors: Arc<AtomicUsize>,
        rng: StdRng,
    ) -> Self {
        let generator = TraceGenerator::new(&pool, id, &config);
        Self {
            id,
            pool,
            config,
            generator,
            exporter,
            mailbox,
            cancel,
            metrics,
            log,
            errors,
            rng,
            record: IterationRecord::default(),
            stats: WorkerStats::new(),
            initialized: false,
        }
    }

    /// Run iterations until cancelled
    ///
    /// Per-iteration failures are logged and counted; only cancellation or
    /// an unexpected error ends the loop. The `Initialized` line is written
    /// on the first call only, so a restarted worker does not repeat it.
    pub async fn run(&mut self) -> WorkerExit {
        self.stats.start();

        if !self.initialized {
            self.initialized = true;
            if let Err(e) = self.write(WorkerStatus::Initialized) {
                return WorkerExit::Transient(e);
            }
            tracing::debug!(worker_id = self.id, pool = %self.pool, "Worker started");
        }

        loop {
            match self.run_once().await {
                Ok(IterationOutcome::Cancelled) => {
                    self.stats.stop();
                    tracing::debug!(
                        worker_id = self.id,
                        received = self.stats.received,
                        errors = self.stats.errors(),
                        "Worker stopped"
                    );
                    return WorkerExit::Cancelled;
                }
                Ok(IterationOutcome::Success { round_trip }) => {
                    tracing::trace!(
                        worker_id = self.id,
                        round_trip_ms = round_trip.as_millis() as u64,
                        "Trace confirmed"
                    );
                }
                Ok(outcome) => {
                    tracing::debug!(worker_id = self.id, outcome = ?outcome, "Iteration failed");
                }
                Err(e) => return WorkerExit::Transient(e),
            }
        }
    }

    /// Execute a single iteration and write its result line
    pub async fn run_once(&mut self) -> BenchResult<IterationOutcome> {
        self.record.reset();
        if self.cancel.is_cancelled() {
            return self.stopped();
        }

        // 1. Generate
        self.record.started_at = Some(Utc::now());
        let plan = self.generator.plan(&mut self.rng);
        self.record.apply_plan(&plan);
        let Some(trace) = self
            .generator
            .build(&plan, &mut self.rng, &self.cancel)
            .await
        else {
            return self.stopped();
        };

        // A confirmation for an earlier, timed-out trace must not count for this one
        let stale = self.mailbox.drain();
        if stale > 0 {
            tracing::debug!(worker_id = self.id, stale, "Discarded stale notifications");
        }

        // 2. Export
        self.record.send_started_at = Some(Utc::now());
        let send_started = Instant::now();
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = tokio::time::timeout(self.config.send_timeout, self.exporter.export(&trace)) => Some(result),
        };
        match sent {
            None => return self.stopped(),
            Some(Err(_elapsed)) => return self.send_timed_out(send_started),
            Some(Ok(Err(e))) if e.is_timeout() => return self.send_timed_out(send_started),
            Some(Ok(Err(e))) => {
                self.record.received_at = Some(Utc::now());
                self.record.delta = send_started.elapsed();
                self.stats.send_errors += 1;
                tracing::warn!(worker_id = self.id, error = %e, "Export failed");
                self.fail(WorkerStatus::SendError, ErrorKind::SendError)?;
                return Ok(IterationOutcome::SendError(e.to_string()));
            }
            Some(Ok(Ok(()))) => {}
        }
        self.record.send_ended_at = Some(Utc::now());
        let send_ended = Instant::now();
        self.stats.sent += 1;
        self.metrics.increment_counter(Counter::TracesSent, &self.pool);

        // 3. Await confirmation
        let wake = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Wake::Cancelled,
            delivered = self.mailbox.recv() => if delivered { Wake::Notified } else { Wake::Closed },
            _ = tokio::time::sleep(self.config.receive_timeout) => Wake::TimedOut,
        };

        match wake {
            Wake::Cancelled | Wake::Closed => self.stopped(),
            Wake::TimedOut => {
                self.record.received_at = Some(Utc::now());
                self.record.delta = send_ended.elapsed();
                self.stats.receive_timeouts += 1;
                self.fail(WorkerStatus::ReceiveTimeout, ErrorKind::ReceiveTimeout)?;
                Ok(IterationOutcome::ReceiveTimeout)
            }
            Wake::Notified => {
                let round_trip = send_ended.elapsed();
                self.record.received_at = Some(Utc::now());
                self.record.delta = round_trip;
                self.record.cool_down = random_duration(&mut self.rng, self.config.max_cool_down);
                self.stats.received += 1;

                self.metrics.increment_counter(Counter::TracesReceived, &self.pool);
                self.metrics.observe_distribution(
                    Distribution::RoundTripSeconds,
                    &self.pool,
                    round_trip.as_secs_f64(),
                );
                self.write(WorkerStatus::Success)?;

                // 4. Cooldown
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return self.stopped(),
                    _ = tokio::time::sleep(self.record.cool_down) => {}
                }
                Ok(IterationOutcome::Success { round_trip })
            }
        }
    }

    fn write(&self, status: WorkerStatus) -> BenchResult<()> {
        self.log.append(&self.record.to_log_line(self.id, status))
    }

    fn send_timed_out(&mut self, send_started: Instant) -> BenchResult<IterationOutcome> {
        self.record.received_at = Some(Utc::now());
        self.record.delta = send_started.elapsed();
        self.stats.send_timeouts += 1;
        self.fail(WorkerStatus::SendTimeout, ErrorKind::SendTimeout)?;
        Ok(IterationOutcome::SendTimeout)
    }

    fn fail(&mut self, status: WorkerStatus, kind: ErrorKind) -> BenchResult<()> {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.metrics.increment_counter(Counter::WorkerErrors(kind), &self.pool);
        self.write(status)
    }

    fn stopped(&mut self) -> BenchResult<IterationOutcome> {
        self.write(WorkerStatus::Stopped)?;
        Ok(IterationOutcome::Cancelled)
    }

    /// Get the worker ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Statistics accumulated so far
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Consume the worker, returning its statistics
    pub fn into_stats(self) -> WorkerStats {
        self.stats
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("pool", &self.pool)
            .field("exporter", &self.exporter.name())
            .field("stats", &self.stats)
            .finish()
    }
}
