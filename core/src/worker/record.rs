//! Per-iteration measurements and their result-log encoding

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::generator::TracePlan;

/// Outcome code written as the second field of every result line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerStatus {
    /// The worker started
    Initialized = 0,
    /// The confirmation arrived in time
    Success = 1,
    /// Export did not finish within the send timeout
    SendTimeout = 2,
    /// Export failed
    SendError = 3,
    /// No confirmation within the receive timeout
    ReceiveTimeout = 4,
    /// The worker was cancelled
    Stopped = 5,
}

impl WorkerStatus {
    /// Numeric code
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Scratch measurements of one iteration, reset after each
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationRecord {
    /// Length of the child chain
    pub trace_depth: u32,
    /// Depth of the risky child, 0 if none
    pub risky_depth: u32,
    /// Extra attributes across the trace
    pub extra_attributes: u32,
    /// Accumulated simulated span work
    pub span_length: Duration,
    /// Cooldown drawn after a success
    pub cool_down: Duration,
    /// Iteration start
    pub started_at: Option<DateTime<Utc>>,
    /// Export start
    pub send_started_at: Option<DateTime<Utc>>,
    /// Export end
    pub send_ended_at: Option<DateTime<Utc>>,
    /// Confirmation arrival, or when the iteration gave up
    pub received_at: Option<DateTime<Utc>>,
    /// Time between the reference send instant and `received_at`
    pub delta: Duration,
}

impl IterationRecord {
    /// Clear every field
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Copy the shape of a planned trace
    pub fn apply_plan(&mut self, plan: &TracePlan) {
        self.trace_depth = plan.depth;
        self.risky_depth = plan.risky_depth;
        self.extra_attributes = plan.extra_attributes();
        self.span_length = plan.span_length();
    }

    /// Encode as one space-separated result line
    ///
    /// Fields: worker ID, status code, trace depth, risky depth, extra
    /// attributes, span length ms, cooldown ms, start / send-begin /
    /// send-end / receive epoch ms, delta ms. Unset timestamps are 0.
    pub fn to_log_line(&self, worker_id: u64, status: WorkerStatus) -> String {
        let epoch_ms = |t: Option<DateTime<Utc>>| t.map_or(0, |t| t.timestamp_millis());
        format!(
            "{} {} {} {} {} {} {} {} {} {} {} {}",
            worker_id,
            status.code(),
            self.trace_depth,
            self.risky_depth,
            self.extra_attributes,
            self.span_length.as_millis(),
            self.cool_down.as_millis(),
            epoch_ms(self.started_at),
            epoch_ms(self.send_started_at),
            epoch_ms(self.send_ended_at),
            epoch_ms(self.received_at),
            self.delta.as_millis(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_codes() {
        let codes: Vec<u8> = [
            WorkerStatus::Initialized,
            WorkerStatus::Success,
            WorkerStatus::SendTimeout,
            WorkerStatus::SendError,
            WorkerStatus::ReceiveTimeout,
            WorkerStatus::Stopped,
        ]
        .iter()
        .map(|s| s.code())
        .collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_record_line() {
        let line = IterationRecord::default().to_log_line(3, WorkerStatus::Initialized);
        assert_eq!(line, "3 0 0 0 0 0 0 0 0 0 0 0");
    }

    #[test]
    fn test_full_record_line() {
        let t = |ms: i64| Some(Utc.timestamp_millis_opt(ms).unwrap());
        let record = IterationRecord {
            trace_depth: 4,
            risky_depth: 2,
            extra_attributes: 5,
            span_length: Duration::from_millis(120),
            cool_down: Duration::from_millis(300),
            started_at: t(1_000),
            send_started_at: t(1_120),
            send_ended_at: t(1_130),
            received_at: t(1_180),
            delta: Duration::from_millis(50),
        };

        let line = record.to_log_line(12, WorkerStatus::Success);
        assert_eq!(line, "12 1 4 2 5 120 300 1000 1120 1130 1180 50");
        assert_eq!(line.split(' ').count(), 12);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut record = IterationRecord {
            trace_depth: 4,
            delta: Duration::from_millis(9),
            started_at: Some(Utc::now()),
            ..Default::default()
        };
        record.reset();
        assert_eq!(record, IterationRecord::default());
    }
}
