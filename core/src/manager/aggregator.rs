//! Result aggregation from the workers of a stopped pool

use std::time::Duration;

use serde::Serialize;

use crate::worker::WorkerStats;

/// Aggregated statistics from all workers of a pool
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedStats {
    /// Workers whose statistics were collected
    pub total_workers: usize,

    /// Workers that had to be aborted at shutdown
    pub aborted_workers: usize,

    /// Traces exported
    pub total_sent: usize,

    /// Confirmations received
    pub total_received: usize,

    /// Send timeouts
    pub send_timeouts: usize,

    /// Send errors
    pub send_errors: usize,

    /// Receive timeouts
    pub receive_timeouts: usize,

    /// Longest worker lifetime
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,

    /// Confirmed traces per second over `total_duration`
    pub traces_per_second: f64,
}

impl AggregatedStats {
    /// Failed iterations of any kind
    pub fn total_errors(&self) -> usize {
        self.send_timeouts + self.send_errors + self.receive_timeouts
    }

    /// Share of finished iterations that were confirmed (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        let total = self.total_received + self.total_errors();
        if total > 0 {
            self.total_received as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Aggregate statistics from multiple workers
pub fn aggregate_worker_stats(stats: &[WorkerStats]) -> AggregatedStats {
    if stats.is_empty() {
        return AggregatedStats::default();
    }

    let mut merged = WorkerStats::new();
    for s in stats {
        merged.merge(s);
    }

    // Use the maximum elapsed time across all workers
    let total_duration = stats
        .iter()
        .filter_map(|s| s.elapsed())
        .max()
        .unwrap_or(Duration::ZERO);

    let secs = total_duration.as_secs_f64();
    let traces_per_second = if secs > 0.0 {
        merged.received as f64 / secs
    } else {
        0.0
    };

    AggregatedStats {
        total_workers: stats.len(),
        aborted_workers: 0,
        total_sent: merged.sent,
        total_received: merged.received,
        send_timeouts: merged.send_timeouts,
        send_errors: merged.send_errors,
        receive_timeouts: merged.receive_timeouts,
        total_duration,
        traces_per_second,
    }
}
