//! Benchmark lifecycle execution

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult};
use crate::manager::{
    AggregatedStats, Manager, ManagerBuilder, PoolStatus, DEFAULT_DRAIN_INTERVAL,
    DEFAULT_SHUTDOWN_GRACE,
};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::result_log::ResultLog;
use crate::scaling::{ScalingEngine, ScalingOutcome, ScalingProfile};
use crate::traits::{TraceExporter, WorkerPool};

use super::state::BenchmarkState;

/// Settings that apply to every run of a benchmark
#[derive(Clone)]
pub struct BenchmarkOptions {
    /// Directory result logs are created in
    pub log_dir: PathBuf,
    /// Wait after cancellation for final result lines
    pub drain_interval: Duration,
    /// Receiver shutdown deadline
    pub shutdown_grace: Duration,
    /// Exporter used instead of OTLP/HTTP
    pub exporter: Option<Arc<dyn TraceExporter>>,
    /// Metrics sink handed to each manager
    pub metrics: Arc<dyn MetricsSink>,
    /// Seed for reproducible traces
    pub seed: Option<u64>,
}

impl BenchmarkOptions {
    /// Create result logs in `dir`
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Set the drain interval
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Set the receiver shutdown deadline
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Use `exporter` for every worker
    pub fn with_exporter(mut self, exporter: Arc<dyn TraceExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Report through `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Seed worker randomness
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir(),
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            exporter: None,
            metrics: Arc::new(NoopMetrics),
            seed: None,
        }
    }
}

impl std::fmt::Debug for BenchmarkOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkOptions")
            .field("log_dir", &self.log_dir)
            .field("drain_interval", &self.drain_interval)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("exporter", &self.exporter.as_ref().map(|e| e.name().to_string()))
            .field("seed", &self.seed)
            .finish()
    }
}

/// Point-in-time view of a benchmark
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkStatus {
    /// Lifecycle state
    pub state: BenchmarkState,
    /// Current step (1-based), or tick count at a fixed rate
    pub current_step: usize,
    /// Number of steps in the plan
    pub max_step: usize,
    /// Counters of the current pool
    #[serde(rename = "managerState")]
    pub manager: PoolStatus,
    /// Result log of the current run, empty before the first start
    pub log_file: String,
}

#[derive(Default)]
struct BenchmarkInner {
    config: Option<BenchConfig>,
    state: BenchmarkState,
    manager: Option<Arc<Manager>>,
    result_log: Option<Arc<ResultLog>>,
    cancel: Option<CancellationToken>,
    run_id: u64,
    max_step: usize,
}

/// One named benchmark: a configuration, a pool manager and a scaling run
///
/// Every lifecycle operation holds the benchmark's lock for its whole
/// duration, so transitions never interleave.
pub struct Benchmark {
    name: String,
    options: BenchmarkOptions,
    inner: Arc<Mutex<BenchmarkInner>>,
    current_step: Arc<AtomicUsize>,
}

impl Benchmark {
    /// Create an unconfigured benchmark
    pub fn new(name: impl Into<String>, options: BenchmarkOptions) -> Self {
        Self {
            name: name.into(),
            options,
            inner: Arc::new(Mutex::new(BenchmarkInner::default())),
            current_step: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Benchmark name, also used as the pool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub async fn state(&self) -> BenchmarkState {
        self.inner.lock().await.state
    }

    /// Store `config` and move to `Configured`
    ///
    /// Allowed from any state. A running pool keeps running with its old
    /// settings until the benchmark is stopped or started again.
    pub async fn configure(&self, config: BenchConfig) -> BenchResult<()> {
        config.validate()?;

        let mut inner = self.inner.lock().await;
        if inner.state.is_active() {
            tracing::warn!(
                benchmark = %self.name,
                state = %inner.state,
                "Reconfiguring active benchmark"
            );
        }
        inner.config = Some(config);
        inner.state = BenchmarkState::Configured;
        tracing::info!(benchmark = %self.name, "Benchmark configured");
        Ok(())
    }

    /// Create a result log and a pool, start the receiver and launch the
    /// scaling plan
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` before `configure`, `InvalidTransition` while
    /// running or once stopped.
    pub async fn start(&self) -> BenchResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            BenchmarkState::Uninitialized => {
                return Err(BenchError::missing_config("benchmark config"))
            }
            BenchmarkState::Running | BenchmarkState::Stopped => {
                return Err(BenchError::invalid_transition("start", inner.state))
            }
            BenchmarkState::Configured | BenchmarkState::Finished => {}
        }
        let config = inner
            .config
            .clone()
            .ok_or_else(|| BenchError::missing_config("benchmark config"))?;

        // A previous run may still own workers (restart from Finished, or a
        // reconfigure while running)
        if let Err(e) = self.retire(&mut inner).await {
            tracing::warn!(benchmark = %self.name, error = %e, "Could not retire previous run");
        }

        let log = Arc::new(ResultLog::create(&self.options.log_dir, &self.name)?);
        let manager = match self.launch_manager(&config, &log).await {
            Ok(manager) => manager,
            Err(e) => {
                if let Err(remove) = log.remove() {
                    tracing::warn!(error = %remove, "Could not remove result log");
                }
                return Err(e);
            }
        };

        let profile = ScalingProfile::from_config(&config);
        let cancel = CancellationToken::new();
        inner.run_id += 1;
        inner.max_step = profile.max_step();
        self.current_step.store(0, Ordering::SeqCst);

        let pool: Arc<dyn WorkerPool> = manager.clone();
        let engine = ScalingEngine::new(profile, pool)
            .with_cancel_token(cancel.clone())
            .with_step_counter(Arc::clone(&self.current_step));
        let shared = Arc::clone(&self.inner);
        let run_id = inner.run_id;
        let name = self.name.clone();
        tokio::spawn(async move {
            if engine.run().await != ScalingOutcome::Completed {
                return;
            }
            let mut inner = shared.lock().await;
            if inner.state == BenchmarkState::Running && inner.run_id == run_id {
                inner.state = BenchmarkState::Finished;
                tracing::info!(benchmark = %name, "Benchmark finished");
            }
        });

        tracing::info!(
            benchmark = %self.name,
            log = %log.path().display(),
            receiver = ?manager.local_addr(),
            "Benchmark started"
        );
        inner.manager = Some(manager);
        inner.result_log = Some(log);
        inner.cancel = Some(cancel);
        inner.state = BenchmarkState::Running;
        Ok(())
    }

    async fn launch_manager(
        &self,
        config: &BenchConfig,
        log: &Arc<ResultLog>,
    ) -> BenchResult<Arc<Manager>> {
        let mut builder = ManagerBuilder::new(&self.name)
            .metrics(Arc::clone(&self.options.metrics))
            .result_log(Arc::clone(log))
            .drain_interval(self.options.drain_interval)
            .shutdown_grace(self.options.shutdown_grace)
            .seed(self.options.seed);
        if let Some(exporter) = &self.options.exporter {
            builder = builder.exporter(Arc::clone(exporter));
        }

        let manager = Arc::new(builder.build()?);
        manager.configure(config.worker_config.clone())?;
        manager.start().await?;
        Ok(manager)
    }

    /// Stop the workers and the receiver and close the result log
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless running or finished.
    pub async fn stop(&self) -> BenchResult<AggregatedStats> {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_active() {
            return Err(BenchError::invalid_transition("stop", inner.state));
        }

        let stats = self.retire(&mut inner).await?;
        inner.state = BenchmarkState::Stopped;
        tracing::info!(
            benchmark = %self.name,
            received = stats.total_received,
            errors = stats.total_errors(),
            "Benchmark stopped"
        );
        Ok(stats)
    }

    /// Stop if needed, then delete the result log
    pub async fn destroy(&self) -> BenchResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != BenchmarkState::Stopped {
            self.retire(&mut inner).await?;
            inner.state = BenchmarkState::Stopped;
        }
        if let Some(log) = inner.result_log.take() {
            log.remove()?;
        }
        tracing::info!(benchmark = %self.name, "Benchmark destroyed");
        Ok(())
    }

    /// Cancel the scaling run, stop the manager and close the log
    async fn retire(&self, inner: &mut BenchmarkInner) -> BenchResult<AggregatedStats> {
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        let stats = match inner.manager.as_ref() {
            Some(manager) => manager.stop().await?,
            None => AggregatedStats::default(),
        };
        if let Some(log) = &inner.result_log {
            log.close()?;
        }
        Ok(stats)
    }

    /// Current state, step and pool counters
    pub async fn status(&self) -> BenchmarkStatus {
        let inner = self.inner.lock().await;
        BenchmarkStatus {
            state: inner.state,
            current_step: self.current_step.load(Ordering::SeqCst),
            max_step: inner.max_step,
            manager: inner
                .manager
                .as_ref()
                .map(|m| m.status())
                .unwrap_or_default(),
            log_file: inner
                .result_log
                .as_ref()
                .map(|log| log.path().display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Path of the current result log
    pub async fn log_path(&self) -> Option<PathBuf> {
        let inner = self.inner.lock().await;
        inner.result_log.as_ref().map(|log| log.path().to_path_buf())
    }

    /// Directory new result logs are created in
    pub fn log_dir(&self) -> &Path {
        &self.options.log_dir
    }
}

impl std::fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Benchmark")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("current_step", &self.current_step.load(Ordering::SeqCst))
            .finish()
    }
}
