//! Pool manager execution logic

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{mailbox, Delivery, MailboxSender};
use crate::config::WorkerConfig;
use crate::error::{BenchError, BenchResult, ErrorKind};
use crate::metrics::{Counter, Gauge, MetricsSink};
use crate::otlp::OtlpHttpExporter;
use crate::receiver::Receiver;
use crate::result_log::ResultLog;
use crate::traits::{Notifier, TraceExporter, WorkerPool};
use crate::worker::{Worker, WorkerBuilder, WorkerExit, WorkerStats};

use super::aggregator::{aggregate_worker_stats, AggregatedStats};

/// Snapshot of a pool's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    /// Workers currently running
    pub active_workers: usize,
    /// Failed iterations and restarts so far
    pub errors: usize,
    /// Workers ever created
    pub total_workers: usize,
}

struct WorkerHandle {
    mailbox: MailboxSender,
    task: Option<JoinHandle<WorkerStats>>,
}

struct PoolState {
    workers: HashMap<u64, WorkerHandle>,
    next_id: u64,
    registered: usize,
    stopped: bool,
}

/// State shared between the manager, its supervisors and its receiver
pub(crate) struct PoolShared {
    name: String,
    state: RwLock<PoolState>,
    active: AtomicUsize,
    errors: Arc<AtomicUsize>,
    metrics: Arc<dyn MetricsSink>,
}

impl PoolShared {
    fn read(&self) -> RwLockReadGuard<'_, PoolState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PoolState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn publish_active(&self, active: usize) {
        self.metrics
            .set_gauge(Gauge::ActiveWorkers, &self.name, active as f64);
    }

    fn worker_exited(&self) {
        let previous = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        self.publish_active(previous.saturating_sub(1));
    }
}

impl Notifier for PoolShared {
    fn notify(&self, worker_id: u64) -> BenchResult<()> {
        let state = self.read();
        if state.stopped {
            return Err(BenchError::ManagerStopped);
        }
        let handle = state
            .workers
            .get(&worker_id)
            .ok_or(BenchError::WorkerNotFound(worker_id))?;

        match handle.mailbox.try_notify() {
            Delivery::Delivered | Delivery::Dropped => Ok(()),
            Delivery::Closed => Err(BenchError::WorkerNotFound(worker_id)),
        }
    }
}

/// Restart `worker` until it exits through cancellation
async fn supervise(
    shared: Arc<PoolShared>,
    cancel: CancellationToken,
    mut worker: Worker,
) -> WorkerStats {
    loop {
        match worker.run().await {
            WorkerExit::Cancelled => break,
            WorkerExit::Transient(e) => {
                if cancel.is_cancelled() {
                    break;
                }
                shared.errors.fetch_add(1, Ordering::Relaxed);
                shared
                    .metrics
                    .increment_counter(Counter::WorkerErrors(ErrorKind::Restart), &shared.name);
                tracing::warn!(
                    pool = %shared.name,
                    worker_id = worker.id(),
                    error = %e,
                    "Worker exited unexpectedly, restarting"
                );
                tokio::task::yield_now().await;
            }
        }
    }

    shared.worker_exited();
    worker.into_stats()
}

/// Owns the workers of one pool
///
/// Workers can be added while running but never removed. Once stopped, a
/// manager rejects notifications and cannot be restarted.
pub struct Manager {
    pub(crate) shared: Arc<PoolShared>,
    pub(crate) config: RwLock<Option<Arc<WorkerConfig>>>,
    pub(crate) exporter: RwLock<Option<Arc<dyn TraceExporter>>>,
    pub(crate) exporter_override: Option<Arc<dyn TraceExporter>>,
    pub(crate) receiver: RwLock<Option<Arc<Receiver>>>,
    pub(crate) result_log: Arc<ResultLog>,
    pub(crate) cancel: CancellationToken,
    pub(crate) drain_interval: Duration,
    pub(crate) shutdown_grace: Duration,
    pub(crate) seed: Option<u64>,
}

impl Manager {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        metrics: Arc<dyn MetricsSink>,
        result_log: Arc<ResultLog>,
        exporter_override: Option<Arc<dyn TraceExporter>>,
        drain_interval: Duration,
        shutdown_grace: Duration,
        seed: Option<u64>,
    ) -> Self {
        let shared = Arc::new(PoolShared {
            name,
            state: RwLock::new(PoolState {
                workers: HashMap::new(),
                next_id: 1,
                registered: 0,
                stopped: false,
            }),
            active: AtomicUsize::new(0),
            errors: Arc::new(AtomicUsize::new(0)),
            metrics,
        });

        Self {
            shared,
            config: RwLock::new(None),
            exporter: RwLock::new(None),
            exporter_override,
            receiver: RwLock::new(None),
            result_log,
            cancel: CancellationToken::new(),
            drain_interval,
            shutdown_grace,
            seed,
        }
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether [`stop`](Self::stop) has completed
    pub fn is_stopped(&self) -> bool {
        self.shared.read().stopped
    }

    /// Validate and store the worker configuration, and prepare the
    /// receiver and exporter it names
    pub fn configure(&self, config: WorkerConfig) -> BenchResult<()> {
        if self.is_stopped() {
            return Err(BenchError::ManagerStopped);
        }
        config.validate()?;

        let exporter: Arc<dyn TraceExporter> = match &self.exporter_override {
            Some(exporter) => Arc::clone(exporter),
            None => Arc::new(OtlpHttpExporter::new(&config.target)?),
        };

        {
            let mut receiver = self.receiver.write().unwrap_or_else(|e| e.into_inner());
            let running = receiver
                .as_ref()
                .is_some_and(|r| r.local_addr().is_some());
            if running {
                tracing::warn!(
                    pool = %self.name(),
                    "Receiver already listening, keeping its address"
                );
            } else {
                *receiver = Some(Arc::new(Receiver::new(
                    self.name(),
                    config.receiver_address.clone(),
                )));
            }
        }

        tracing::debug!(
            pool = %self.name(),
            target = %config.target,
            receiver = %config.receiver_address,
            exporter = exporter.name(),
            "Manager configured"
        );
        *self.exporter.write().unwrap_or_else(|e| e.into_inner()) = Some(exporter);
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(config));
        Ok(())
    }

    /// Bind the receiver and serve it in the background
    ///
    /// A no-op once the manager is stopping or stopped.
    pub async fn start(&self) -> BenchResult<()> {
        if self.cancel.is_cancelled() || self.is_stopped() {
            tracing::debug!(pool = %self.name(), "Ignoring start of stopped manager");
            return Ok(());
        }
        let receiver = self
            .receiver
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(BenchError::missing_config("worker config"))?;

        let notifier: Arc<dyn Notifier> = self.shared.clone();
        receiver.start(notifier).await?;
        Ok(())
    }

    /// Create, register and launch `count` workers
    ///
    /// IDs continue from the highest ID issued. The whole batch is
    /// registered before any worker is launched, and a concurrent
    /// [`stop`](Self::stop) either collects all of it or none.
    pub fn add_workers(&self, count: usize) -> BenchResult<()> {
        if count == 0 {
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            return Err(BenchError::ManagerStopped);
        }
        let config = self
            .config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(BenchError::missing_config("worker config"))?;
        let exporter = self
            .exporter
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(BenchError::missing_config("exporter"))?;

        let (first_id, active) = {
            let mut state = self.shared.write();
            if state.stopped {
                return Err(BenchError::ManagerStopped);
            }

            // 1. Build; IDs are committed only once the whole batch exists
            let first_id = state.next_id;
            let mut batch = Vec::with_capacity(count);
            for id in first_id..first_id + count as u64 {
                let (tx, rx) = mailbox();
                let worker = WorkerBuilder::new(self.name(), id)
                    .config(Arc::clone(&config))
                    .exporter(Arc::clone(&exporter))
                    .mailbox(rx)
                    .cancel_token(self.cancel.clone())
                    .metrics(Arc::clone(&self.shared.metrics))
                    .result_log(Arc::clone(&self.result_log))
                    .error_counter(Arc::clone(&self.shared.errors))
                    .seed(self.seed)
                    .build()?;
                batch.push((tx, worker));
            }
            state.next_id += count as u64;
            state.registered += count;

            // 2. Register
            for (tx, worker) in &batch {
                state.workers.insert(
                    worker.id(),
                    WorkerHandle {
                        mailbox: tx.clone(),
                        task: None,
                    },
                );
            }
            let active = self.shared.active.fetch_add(count, Ordering::SeqCst) + count;

            // 3. Launch
            for (_, worker) in batch {
                let id = worker.id();
                let task = tokio::spawn(supervise(
                    Arc::clone(&self.shared),
                    self.cancel.clone(),
                    worker,
                ));
                if let Some(handle) = state.workers.get_mut(&id) {
                    handle.task = Some(task);
                }
            }
            (first_id, active)
        };
        self.shared.publish_active(active);

        tracing::debug!(
            pool = %self.name(),
            added = count,
            first_id,
            active,
            "Workers added"
        );
        Ok(())
    }

    /// Stop every worker and the receiver
    ///
    /// Cancels the pool token, shuts the receiver down within the grace
    /// period, waits the drain interval for final result lines, then marks
    /// the manager stopped. Calling it again returns empty statistics.
    pub async fn stop(&self) -> BenchResult<AggregatedStats> {
        if self.is_stopped() {
            return Ok(AggregatedStats::default());
        }
        self.cancel.cancel();

        let receiver = self
            .receiver
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(receiver) = receiver {
            receiver.shutdown(self.shutdown_grace).await;
        }

        tokio::time::sleep(self.drain_interval).await;

        let workers = {
            let mut state = self.shared.write();
            state.stopped = true;
            std::mem::take(&mut state.workers)
        };
        self.shared.active.store(0, Ordering::SeqCst);
        self.shared.publish_active(0);

        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        let mut collected = Vec::with_capacity(workers.len());
        let mut aborted = 0;
        for (id, handle) in workers {
            let Some(mut task) = handle.task else { continue };
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(stats)) => collected.push(stats),
                Ok(Err(e)) => {
                    tracing::error!(worker_id = id, error = %e, "Worker task panicked")
                }
                Err(_) => {
                    tracing::warn!(worker_id = id, "Worker did not stop in time, aborting");
                    task.abort();
                    aborted += 1;
                }
            }
        }

        let mut aggregated = aggregate_worker_stats(&collected);
        aggregated.aborted_workers = aborted;
        tracing::info!(
            pool = %self.name(),
            workers = aggregated.total_workers,
            aborted,
            received = aggregated.total_received,
            errors = aggregated.total_errors(),
            "Manager stopped"
        );
        Ok(aggregated)
    }

    /// Wake worker `worker_id`; never blocks
    pub fn notify(&self, worker_id: u64) -> BenchResult<()> {
        self.shared.notify(worker_id)
    }

    /// Current counters
    pub fn status(&self) -> PoolStatus {
        let total_workers = self.shared.read().registered;
        PoolStatus {
            active_workers: self.shared.active.load(Ordering::SeqCst),
            errors: self.shared.errors.load(Ordering::Relaxed),
            total_workers,
        }
    }

    /// Receiver address once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.receiver
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(|r| r.local_addr())
    }

    /// The result log workers write to
    pub fn result_log(&self) -> &Arc<ResultLog> {
        &self.result_log
    }
}

impl WorkerPool for Manager {
    fn add_workers(&self, count: usize) -> BenchResult<()> {
        Manager::add_workers(self, count)
    }
}

impl Notifier for Manager {
    fn notify(&self, worker_id: u64) -> BenchResult<()> {
        self.shared.notify(worker_id)
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("name", &self.shared.name)
            .field("status", &self.status())
            .field("log", &self.result_log.path())
            .finish()
    }
}
