//! Mapping inbound trace batches back to the workers that emitted them

use crate::error::{BenchError, BenchResult};
use crate::otlp::proto::ExportTraceServiceRequest;
use crate::trace::SERVICE_NAME_PREFIX;
use crate::traits::Notifier;

/// What happened to the resources of one inbound request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelationSummary {
    /// Workers that were notified
    pub notified: usize,
    /// Resources that did not identify one of this pool's workers
    pub skipped: usize,
    /// Notifications the pool rejected (unknown worker, stopped pool)
    pub failed: usize,
}

/// Parses `service.name = "benchd-worker.<pool>.<id>"` for one pool
#[derive(Debug, Clone)]
pub struct Correlator {
    pool: String,
}

impl Correlator {
    /// Create a correlator accepting only traces of `pool`
    pub fn new(pool: impl Into<String>) -> Self {
        Self { pool: pool.into() }
    }

    /// Pool this correlator accepts
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Extract the worker ID from a `service.name` value
    ///
    /// Pool names may contain dots; the ID is everything after the last one.
    pub fn parse_worker_id(&self, service_name: &str) -> BenchResult<u64> {
        let rest = service_name
            .strip_prefix(SERVICE_NAME_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or_else(|| {
                BenchError::CorrelationParseSkip(format!("foreign service.name {service_name:?}"))
            })?;
        let (pool, id) = rest.rsplit_once('.').ok_or_else(|| {
            BenchError::CorrelationParseSkip(format!("malformed service.name {service_name:?}"))
        })?;
        if pool != self.pool {
            return Err(BenchError::CorrelationParseSkip(format!(
                "service.name {service_name:?} belongs to pool {pool:?}"
            )));
        }
        id.parse::<u64>().map_err(|_| {
            BenchError::CorrelationParseSkip(format!(
                "malformed id in service.name {service_name:?}"
            ))
        })
    }

    /// Notify the worker behind every resource of `request`
    ///
    /// Parse failures and notification errors are logged and skipped.
    pub fn correlate(
        &self,
        request: &ExportTraceServiceRequest,
        notifier: &dyn Notifier,
    ) -> CorrelationSummary {
        let mut summary = CorrelationSummary::default();

        for resource_spans in &request.resource_spans {
            let Some(service_name) = resource_spans.service_name() else {
                tracing::debug!("Resource without service.name attribute");
                summary.skipped += 1;
                continue;
            };

            let worker_id = match self.parse_worker_id(service_name) {
                Ok(id) => id,
                Err(e) => {
                    tracing::debug!(pool = %self.pool, error = %e, "Skipping resource");
                    summary.skipped += 1;
                    continue;
                }
            };

            match notifier.notify(worker_id) {
                Ok(()) => summary.notified += 1,
                Err(e) => {
                    tracing::debug!(worker_id, error = %e, "Could not notify worker");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otlp::proto::{any_value::Value, AnyValue, KeyValue, Resource, ResourceSpans};
    use crate::test_support::RecordingNotifier;

    fn resource(service_name: Option<&str>) -> ResourceSpans {
        let attributes = service_name
            .map(|name| {
                vec![KeyValue {
                    key: "service.name".into(),
                    value: Some(AnyValue {
                        value: Some(Value::StringValue(name.into())),
                    }),
                }]
            })
            .unwrap_or_default();
        ResourceSpans {
            resource: Some(Resource {
                attributes,
                dropped_attributes_count: 0,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_worker_id() {
        let c = Correlator::new("plan-a");
        assert_eq!(c.parse_worker_id("benchd-worker.plan-a.42").unwrap(), 42);
        assert_eq!(c.parse_worker_id("benchd-worker.plan-a.1").unwrap(), 1);
    }

    #[test]
    fn test_parse_dotted_pool_name() {
        let c = Correlator::new("team.plan");
        assert_eq!(c.parse_worker_id("benchd-worker.team.plan.9").unwrap(), 9);
    }

    #[test]
    fn test_parse_rejections() {
        let c = Correlator::new("plan-a");
        for bad in [
            "frontend",
            "benchd-workerplan-a.1",
            "benchd-worker.plan-a",
            "benchd-worker.plan-b.3",
            "benchd-worker.plan-a.x",
            "benchd-worker.plan-a.-1",
            "benchd-worker.plan-a.",
        ] {
            let err = c.parse_worker_id(bad).unwrap_err();
            assert!(
                matches!(err, BenchError::CorrelationParseSkip(_)),
                "{bad} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_correlate_notifies_and_skips() {
        let c = Correlator::new("plan-a");
        let request = ExportTraceServiceRequest {
            resource_spans: vec![
                resource(Some("benchd-worker.plan-a.1")),
                resource(Some("benchd-worker.plan-a.2")),
                resource(Some("benchd-worker.other.1")),
                resource(Some("checkout")),
                resource(None),
                resource(Some("benchd-worker.plan-a.99")),
            ],
        };
        let notifier = RecordingNotifier::knowing(vec![1, 2]);

        let summary = c.correlate(&request, &notifier);
        assert_eq!(
            summary,
            CorrelationSummary {
                notified: 2,
                skipped: 3,
                failed: 1,
            }
        );
        assert_eq!(notifier.ids(), vec![1, 2]);
    }
}
