//! Benchmark configuration types
//!
//! Configuration is read from JSON with camelCase field names. Durations are
//! written in humantime form (`"500ms"`, `"1s"`, `"2m"`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-run worker configuration
///
/// Immutable for the lifetime of a pool manager. Every worker of the pool
/// reads the same instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerConfig {
    /// Address (`host:port`) of the OTLP/HTTP endpoint traces are sent to
    pub target: String,

    /// Address the correlation receiver listens on
    pub receiver_address: String,

    /// Exclusive upper bound of the nested child chain length
    pub max_trace_depth: u32,

    /// Maximum simultaneous spans (reserved, not used by the generator)
    pub max_number_spans: u32,

    /// Exclusive upper bound of the simulated work inside one child span
    #[serde(with = "humantime_serde")]
    pub max_span_length: Duration,

    /// Exclusive upper bound of the random pause after a successful iteration
    #[serde(with = "humantime_serde")]
    pub max_cool_down: Duration,

    /// Bound on exporting one trace
    #[serde(with = "humantime_serde")]
    pub send_timeout: Duration,

    /// Bound on waiting for the confirmation of one trace
    #[serde(with = "humantime_serde")]
    pub receive_timeout: Duration,

    /// Chance, in percent, that a trace carries the risky attribute
    pub risky_attribute_probability: u8,

    /// Upper bound (inclusive) of synthetic attributes added to each child span
    pub max_extra_attributes: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            target: "localhost:4318".to_string(),
            receiver_address: "0.0.0.0:4319".to_string(),
            max_trace_depth: 5,
            max_number_spans: 0,
            max_span_length: Duration::from_millis(100),
            max_cool_down: Duration::from_secs(1),
            send_timeout: Duration::from_secs(5),
            receive_timeout: Duration::from_secs(30),
            risky_attribute_probability: 0,
            max_extra_attributes: 0,
        }
    }
}

impl WorkerConfig {
    /// Create a config sending to `target` and listening on `receiver_address`
    pub fn new(target: impl Into<String>, receiver_address: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            receiver_address: receiver_address.into(),
            ..Default::default()
        }
    }

    /// Set the maximum trace depth
    pub fn with_max_trace_depth(mut self, depth: u32) -> Self {
        self.max_trace_depth = depth;
        self
    }

    /// Set the maximum simulated span length
    pub fn with_max_span_length(mut self, length: Duration) -> Self {
        self.max_span_length = length;
        self
    }

    /// Set the maximum cooldown
    pub fn with_max_cool_down(mut self, cool_down: Duration) -> Self {
        self.max_cool_down = cool_down;
        self
    }

    /// Set the send timeout
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the receive timeout
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Set the risky attribute probability (percent)
    pub fn with_risky_attribute_probability(mut self, probability: u8) -> Self {
        self.risky_attribute_probability = probability;
        self
    }

    /// Set the maximum number of extra attributes per span
    pub fn with_max_extra_attributes(mut self, max: u32) -> Self {
        self.max_extra_attributes = max;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.trim().is_empty() {
            return Err(ConfigError::MissingAddress("target"));
        }
        if self.receiver_address.trim().is_empty() {
            return Err(ConfigError::MissingAddress("receiverAddress"));
        }
        if self.max_trace_depth == 0 {
            return Err(ConfigError::InvalidTraceDepth);
        }
        if self.risky_attribute_probability > 100 {
            return Err(ConfigError::InvalidProbability(
                self.risky_attribute_probability,
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("sendTimeout"));
        }
        if self.receive_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("receiveTimeout"));
        }
        Ok(())
    }
}

/// Fixed-rate scaling: add `number_workers` every `duration`, until cancelled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixedRate {
    /// Workers added per tick
    pub number_workers: usize,

    /// Tick interval
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// One step of a stepped scaling plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BenchmarkStep {
    /// How long to hold before the next step
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Workers added when the step begins
    pub number_workers: usize,
}

impl BenchmarkStep {
    /// Create a step
    pub fn new(duration: Duration, number_workers: usize) -> Self {
        Self {
            duration,
            number_workers,
        }
    }
}

/// Complete benchmark configuration: worker settings plus a scaling plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BenchConfig {
    /// Settings shared by all workers
    pub worker_config: WorkerConfig,

    /// Fixed-rate plan; takes precedence over `steps` when it adds workers
    pub fixed_rate: FixedRate,

    /// Stepped plan
    pub steps: Vec<BenchmarkStep>,
}

impl BenchConfig {
    /// Create a config with the given worker settings and no scaling plan
    pub fn new(worker_config: WorkerConfig) -> Self {
        Self {
            worker_config,
            ..Default::default()
        }
    }

    /// Use a fixed-rate plan
    pub fn with_fixed_rate(mut self, number_workers: usize, duration: Duration) -> Self {
        self.fixed_rate = FixedRate {
            number_workers,
            duration,
        };
        self
    }

    /// Append a step to the stepped plan
    pub fn with_step(mut self, duration: Duration, number_workers: usize) -> Self {
        self.steps.push(BenchmarkStep::new(duration, number_workers));
        self
    }

    /// Validate the worker settings and the scaling plan
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.worker_config.validate()?;

        if self.fixed_rate.number_workers > 0 {
            if self.fixed_rate.duration.is_zero() {
                return Err(ConfigError::ZeroTick);
            }
        } else if self.steps.is_empty() {
            return Err(ConfigError::NoScalingPlan);
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An address field is empty
    #[error("{0} must not be empty")]
    MissingAddress(&'static str),

    /// Trace depth bound is zero
    #[error("maxTraceDepth must be at least 1")]
    InvalidTraceDepth,

    /// Probability outside [0, 100]
    #[error("riskyAttributeProbability must be within 0..=100, got {0}")]
    InvalidProbability(u8),

    /// A timeout is zero
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    /// Fixed-rate plan adds workers but never waits
    #[error("fixedRate.duration must be greater than zero")]
    ZeroTick,

    /// Neither a fixed-rate plan nor steps were given
    #[error("either fixedRate.numberWorkers or steps must be set")]
    NoScalingPlan,
}
