//! Prometheus-backed metrics sink

use prometheus::{
    GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use super::{Counter, Distribution, Gauge, MetricsSink};

/// Sink that records into its own `prometheus` registry
///
/// Metric names follow the `benchd_*` naming used by existing dashboards.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    active_workers: GaugeVec,
    traces_sent: IntCounterVec,
    traces_received: IntCounterVec,
    worker_errors: IntCounterVec,
    round_trip: HistogramVec,
}

impl PrometheusMetrics {
    /// Create the metric families and register them in a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let active_workers = GaugeVec::new(
            Opts::new(
                "benchd_manager_active_workers_count",
                "The total number of currently active workers",
            ),
            &["name"],
        )?;
        let traces_sent = IntCounterVec::new(
            Opts::new(
                "benchd_manager_traces_sent_count",
                "The total number of traces generated and sent by all workers",
            ),
            &["name"],
        )?;
        let traces_received = IntCounterVec::new(
            Opts::new(
                "benchd_manager_traces_received_count",
                "The total number of traces confirmed back to their worker",
            ),
            &["name"],
        )?;
        let worker_errors = IntCounterVec::new(
            Opts::new(
                "benchd_worker_errors_count",
                "The total number of failed worker iterations and restarts",
            ),
            &["name", "kind"],
        )?;
        let round_trip = HistogramVec::new(
            HistogramOpts::new(
                "benchd_worker_trace_roundtrip_duration_seconds",
                "The duration of a full trace roundtrip from being sent to being finished",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
            &["name"],
        )?;

        registry.register(Box::new(active_workers.clone()))?;
        registry.register(Box::new(traces_sent.clone()))?;
        registry.register(Box::new(traces_received.clone()))?;
        registry.register(Box::new(worker_errors.clone()))?;
        registry.register(Box::new(round_trip.clone()))?;

        Ok(Self {
            registry,
            active_workers,
            traces_sent,
            traces_received,
            worker_errors,
            round_trip,
        })
    }

    /// The underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every family in the text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

impl MetricsSink for PrometheusMetrics {
    fn increment_counter(&self, counter: Counter, pool: &str) {
        match counter {
            Counter::TracesSent => self.traces_sent.with_label_values(&[pool]).inc(),
            Counter::TracesReceived => self.traces_received.with_label_values(&[pool]).inc(),
            Counter::WorkerErrors(kind) => self
                .worker_errors
                .with_label_values(&[pool, kind.as_str()])
                .inc(),
        }
    }

    fn observe_distribution(&self, distribution: Distribution, pool: &str, value: f64) {
        match distribution {
            Distribution::RoundTripSeconds => {
                self.round_trip.with_label_values(&[pool]).observe(value)
            }
        }
    }

    fn set_gauge(&self, gauge: Gauge, pool: &str, value: f64) {
        match gauge {
            Gauge::ActiveWorkers => self.active_workers.with_label_values(&[pool]).set(value),
        }
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_encode_contains_labelled_families() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.increment_counter(Counter::TracesSent, "plan-a");
        metrics.increment_counter(Counter::WorkerErrors(ErrorKind::SendTimeout), "plan-a");
        metrics.set_gauge(Gauge::ActiveWorkers, "plan-a", 12.0);
        metrics.observe_distribution(Distribution::RoundTripSeconds, "plan-a", 0.2);

        let text = metrics.encode().unwrap();
        assert!(text.contains("benchd_manager_traces_sent_count{name=\"plan-a\"} 1"));
        assert!(text.contains("benchd_manager_active_workers_count{name=\"plan-a\"} 12"));
        assert!(text.contains("kind=\"send_timeout\""));
        assert!(text.contains("benchd_worker_trace_roundtrip_duration_seconds_count{name=\"plan-a\"} 1"));
    }

    #[test]
    fn test_instances_do_not_share_registries() {
        let a = PrometheusMetrics::new().unwrap();
        let b = PrometheusMetrics::new().unwrap();
        a.increment_counter(Counter::TracesReceived, "x");
        assert!(!b.encode().unwrap().contains("name=\"x\""));
    }
}
