//! Worker statistics tracking

use std::time::{Duration, Instant};

/// Statistics tracked by each worker across restarts
#[derive(Debug, Default, Clone)]
pub struct WorkerStats {
    /// Traces exported
    pub sent: usize,

    /// Confirmations received in time
    pub received: usize,

    /// Exports that hit the send timeout
    pub send_timeouts: usize,

    /// Exports that failed
    pub send_errors: usize,

    /// Confirmations that never arrived
    pub receive_timeouts: usize,

    /// Worker start time
    pub started_at: Option<Instant>,

    /// Worker end time
    pub ended_at: Option<Instant>,
}

impl WorkerStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking; keeps the first start time
    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Stop tracking (records end time)
    pub fn stop(&mut self) {
        self.ended_at = Some(Instant::now());
    }

    /// Failed iterations of any kind
    pub fn errors(&self) -> usize {
        self.send_timeouts + self.send_errors + self.receive_timeouts
    }

    /// Completed iterations, successful or not
    pub fn iterations(&self) -> usize {
        self.received + self.errors()
    }

    /// Share of iterations that received their confirmation (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        match self.iterations() {
            0 => 0.0,
            n => self.received as f64 / n as f64,
        }
    }

    /// Elapsed time since start
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    /// Merge stats from another worker
    pub fn merge(&mut self, other: &WorkerStats) {
        self.sent += other.sent;
        self.received += other.received;
        self.send_timeouts += other.send_timeouts;
        self.send_errors += other.send_errors;
        self.receive_timeouts += other.receive_timeouts;
    }
}
