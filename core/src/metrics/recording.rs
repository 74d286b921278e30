//! In-process metrics sink

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde::Serialize;

use super::histogram::{LatencyHistogram, LatencyPercentiles};
use super::{Counter, Distribution, Gauge, MetricsSink};

#[derive(Debug, Default)]
struct PoolMetrics {
    traces_sent: u64,
    traces_received: u64,
    errors: BTreeMap<String, u64>,
    active_workers: f64,
    round_trip: LatencyHistogram,
}

/// Point-in-time view of one pool's metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Traces exported
    pub traces_sent: u64,
    /// Confirmations delivered to workers
    pub traces_received: u64,
    /// Worker errors keyed by kind label
    pub errors: BTreeMap<String, u64>,
    /// Last reported active worker count
    pub active_workers: f64,
    /// Number of round-trip observations
    pub round_trip_samples: u64,
    /// Round-trip percentiles in milliseconds
    pub round_trip_ms: LatencyPercentiles,
}

impl MetricsSnapshot {
    /// Sum of all error kinds
    pub fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }
}

/// Sink that keeps everything in memory
///
/// Used by the CLI for its end-of-run summary and by tests to assert on
/// what workers reported.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    pools: Mutex<HashMap<String, PoolMetrics>>,
}

impl RecordingMetrics {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `pool`; all zeros for an unknown pool
    pub fn snapshot(&self, pool: &str) -> MetricsSnapshot {
        let pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
        let Some(metrics) = pools.get(pool) else {
            return MetricsSnapshot::default();
        };
        MetricsSnapshot {
            traces_sent: metrics.traces_sent,
            traces_received: metrics.traces_received,
            errors: metrics.errors.clone(),
            active_workers: metrics.active_workers,
            round_trip_samples: metrics.round_trip.len(),
            round_trip_ms: metrics.round_trip.percentiles(),
        }
    }

    fn with_pool(&self, pool: &str, update: impl FnOnce(&mut PoolMetrics)) {
        let mut pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
        update(pools.entry(pool.to_string()).or_default());
    }
}

impl MetricsSink for RecordingMetrics {
    fn increment_counter(&self, counter: Counter, pool: &str) {
        self.with_pool(pool, |m| match counter {
            Counter::TracesSent => m.traces_sent += 1,
            Counter::TracesReceived => m.traces_received += 1,
            Counter::WorkerErrors(kind) => {
                *m.errors.entry(kind.as_str().to_string()).or_default() += 1;
            }
        });
    }

    fn observe_distribution(&self, distribution: Distribution, pool: &str, value: f64) {
        self.with_pool(pool, |m| match distribution {
            Distribution::RoundTripSeconds => m.round_trip.record_secs(value),
        });
    }

    fn set_gauge(&self, gauge: Gauge, pool: &str, value: f64) {
        self.with_pool(pool, |m| match gauge {
            Gauge::ActiveWorkers => m.active_workers = value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_unknown_pool_is_empty() {
        let metrics = RecordingMetrics::new();
        assert_eq!(metrics.snapshot("missing"), MetricsSnapshot::default());
    }

    #[test]
    fn test_pools_are_kept_apart() {
        let metrics = RecordingMetrics::new();
        metrics.increment_counter(Counter::TracesSent, "a");
        metrics.increment_counter(Counter::TracesSent, "a");
        metrics.increment_counter(Counter::TracesReceived, "b");
        metrics.increment_counter(Counter::WorkerErrors(ErrorKind::ReceiveTimeout), "a");
        metrics.increment_counter(Counter::WorkerErrors(ErrorKind::ReceiveTimeout), "a");
        metrics.increment_counter(Counter::WorkerErrors(ErrorKind::SendError), "a");

        let a = metrics.snapshot("a");
        assert_eq!(a.traces_sent, 2);
        assert_eq!(a.traces_received, 0);
        assert_eq!(a.errors.get("receive_timeout"), Some(&2));
        assert_eq!(a.errors.get("send_error"), Some(&1));
        assert_eq!(a.total_errors(), 3);

        let b = metrics.snapshot("b");
        assert_eq!(b.traces_sent, 0);
        assert_eq!(b.traces_received, 1);
    }

    #[test]
    fn test_round_trip_summary() {
        let metrics = RecordingMetrics::new();
        metrics.observe_distribution(Distribution::RoundTripSeconds, "p", 0.010);
        metrics.observe_distribution(Distribution::RoundTripSeconds, "p", 0.030);

        let snapshot = metrics.snapshot("p");
        assert_eq!(snapshot.round_trip_samples, 2);
        assert!((snapshot.round_trip_ms.mean - 20.0).abs() < 0.1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("roundTripMs").is_some());
    }
}
