//! tracebench-core: Worker pool engine for measuring tracing pipelines
//!
//! Workers emit synthetic traces to a tracing backend and wait for the
//! backend to forward each trace back to a correlation receiver. The time
//! between the end of the send and the confirmation is the round-trip
//! latency of the pipeline.
//!
//! This crate provides:
//!
//! - Trace workers and their result log
//! - The pool manager and its correlation receiver
//! - The scaling engine and benchmark lifecycle
//! - OTLP/HTTP transport, metrics sinks and error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod benchmark;
pub mod channel;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod otlp;
pub mod receiver;
pub mod result_log;
pub mod scaling;
pub mod trace;
pub mod traits;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use benchmark::{
    Benchmark, BenchmarkOptions, BenchmarkRegistry, BenchmarkState, BenchmarkStatus,
};
pub use config::{BenchConfig, BenchmarkStep, ConfigError, FixedRate, WorkerConfig};
pub use error::*;
pub use manager::{AggregatedStats, Manager, ManagerBuilder, PoolStatus};
pub use metrics::{
    Counter, Distribution, FanoutMetrics, Gauge, LatencyPercentiles, MetricsSink,
    MetricsSnapshot, NoopMetrics, PrometheusMetrics, RecordingMetrics,
};
pub use otlp::OtlpHttpExporter;
pub use receiver::Receiver;
pub use result_log::ResultLog;
pub use scaling::{ScalingEngine, ScalingOutcome, ScalingProfile};
pub use traits::*;
pub use worker::{Worker, WorkerBuilder, WorkerStats, WorkerStatus};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::time::Duration;

    // =========================================================================
    // Plan file format
    // =========================================================================

    #[test]
    fn test_plan_json_format() {
        let json = r#"{
            "workerConfig": {
                "target": "collector:4318",
                "receiverAddress": "0.0.0.0:4319",
                "maxTraceDepth": 4,
                "maxSpanLength": "200ms",
                "maxCoolDown": "2s",
                "sendTimeout": "5s",
                "receiveTimeout": "1m",
                "riskyAttributeProbability": 10,
                "maxExtraAttributes": 3
            },
            "steps": [
                { "duration": "30s", "numberWorkers": 5 },
                { "duration": "1m", "numberWorkers": 10 }
            ]
        }"#;
        let plan: BenchConfig = serde_json::from_str(json).unwrap();
        plan.validate().unwrap();

        assert_eq!(plan.worker_config.target, "collector:4318");
        assert_eq!(plan.worker_config.max_span_length, Duration::from_millis(200));
        assert_eq!(plan.worker_config.receive_timeout, Duration::from_secs(60));
        assert_eq!(plan.worker_config.risky_attribute_probability, 10);
        assert_eq!(plan.fixed_rate, FixedRate::default());
        assert_eq!(
            plan.steps,
            vec![
                BenchmarkStep::new(Duration::from_secs(30), 5),
                BenchmarkStep::new(Duration::from_secs(60), 10),
            ]
        );
        assert_eq!(ScalingProfile::from_config(&plan).max_step(), 2);
    }

    #[test]
    fn test_plan_roundtrip() {
        let plan = BenchConfig::new(WorkerConfig::new("collector:4318", "0.0.0.0:4319"))
            .with_fixed_rate(3, Duration::from_millis(500));
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"fixedRate\""));
        assert!(json.contains("\"numberWorkers\":3"));

        let back: BenchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn test_error_kind_roundtrip() {
        for kind in ErrorKind::all() {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            let back: ErrorKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, *kind);
        }
    }

    #[test]
    fn test_pool_status_json_format() {
        let status = PoolStatus {
            active_workers: 4,
            errors: 1,
            total_workers: 6,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"activeWorkers":4,"errors":1,"totalWorkers":6}"#);
    }
}
