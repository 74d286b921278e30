//! Scaling engine
//!
//! Grows a worker pool over time according to one of two profiles. Workers
//! are only ever added, never retracted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{BenchConfig, BenchmarkStep};
use crate::error::BenchError;
use crate::traits::WorkerPool;

/// How the pool grows
#[derive(Debug, Clone, PartialEq)]
pub enum ScalingProfile {
    /// Add `workers_per_tick` workers every `tick`, until cancelled
    FixedRate {
        /// Workers added per tick
        workers_per_tick: usize,
        /// Interval between ticks
        tick: Duration,
    },
    /// Add each step's workers, then hold for its duration
    Steps(Vec<BenchmarkStep>),
}

impl ScalingProfile {
    /// Select the profile a plan describes
    ///
    /// A fixed rate with a non-zero worker count takes precedence over steps.
    pub fn from_config(config: &BenchConfig) -> Self {
        if config.fixed_rate.number_workers > 0 {
            Self::FixedRate {
                workers_per_tick: config.fixed_rate.number_workers,
                tick: config.fixed_rate.duration,
            }
        } else {
            Self::Steps(config.steps.clone())
        }
    }

    /// Number of steps, or 0 for an open-ended fixed rate
    pub fn max_step(&self) -> usize {
        match self {
            Self::FixedRate { .. } => 0,
            Self::Steps(steps) => steps.len(),
        }
    }
}

/// How a scaling run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingOutcome {
    /// Every step was applied and held
    Completed,
    /// The run was cancelled or the pool stopped
    Cancelled,
}

/// Drives a [`WorkerPool`] through a [`ScalingProfile`]
pub struct ScalingEngine {
    profile: ScalingProfile,
    pool: Arc<dyn WorkerPool>,
    cancel: CancellationToken,
    step: Arc<AtomicUsize>,
}

impl ScalingEngine {
    /// Create an engine for `pool`
    pub fn new(profile: ScalingProfile, pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            profile,
            pool,
            cancel: CancellationToken::new(),
            step: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Stop the run when `token` is cancelled
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Publish the current 1-based step (or tick count) into `counter`
    pub fn with_step_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.step = counter;
        self
    }

    /// Current step, 0 before the first
    pub fn current_step(&self) -> usize {
        self.step.load(Ordering::SeqCst)
    }

    /// Run the profile to completion or cancellation
    pub async fn run(self) -> ScalingOutcome {
        match &self.profile {
            ScalingProfile::FixedRate {
                workers_per_tick,
                tick,
            } => self.run_fixed_rate(*workers_per_tick, *tick).await,
            ScalingProfile::Steps(steps) => self.run_steps(steps).await,
        }
    }

    async fn run_fixed_rate(&self, workers_per_tick: usize, tick: Duration) -> ScalingOutcome {
        tracing::info!(
            workers_per_tick,
            tick_ms = tick.as_millis() as u64,
            "Scaling at fixed rate"
        );
        loop {
            if self.cancel.is_cancelled() {
                return ScalingOutcome::Cancelled;
            }
            let n = self.step.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.grow(n, workers_per_tick) || !self.hold(tick).await {
                return ScalingOutcome::Cancelled;
            }
        }
    }

    async fn run_steps(&self, steps: &[BenchmarkStep]) -> ScalingOutcome {
        tracing::info!(steps = steps.len(), "Scaling in steps");
        for (i, step) in steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return ScalingOutcome::Cancelled;
            }
            self.step.store(i + 1, Ordering::SeqCst);
            if !self.grow(i + 1, step.number_workers) || !self.hold(step.duration).await {
                return ScalingOutcome::Cancelled;
            }
        }
        tracing::info!(steps = steps.len(), "Scaling plan completed");
        ScalingOutcome::Completed
    }

    /// Add workers; false once the pool has stopped
    fn grow(&self, step: usize, count: usize) -> bool {
        match self.pool.add_workers(count) {
            Ok(()) => {
                tracing::debug!(step, added = count, "Scaling step applied");
                true
            }
            Err(BenchError::ManagerStopped) => {
                tracing::debug!(step, "Pool stopped, ending scaling");
                false
            }
            Err(e) => {
                tracing::error!(step, error = %e, "Could not add workers");
                true
            }
        }
    }

    /// Wait `duration`; false if cancelled first
    async fn hold(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

impl std::fmt::Debug for ScalingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalingEngine")
            .field("profile", &self.profile)
            .field("current_step", &self.current_step())
            .finish()
    }
}
