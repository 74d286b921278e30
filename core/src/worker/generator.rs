//! Synthetic trace generation
//!
//! Generation happens in two phases so the random shape can be inspected
//! without waiting: [`TraceGenerator::plan`] draws every random choice up
//! front, [`TraceGenerator::build`] then simulates the span work and
//! assembles the spans.

use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::trace::{
    child_span_name, service_name, Attribute, SpanEvent, SyntheticSpan, SyntheticTrace,
    ROOT_SPAN_NAME,
};

/// Uniform duration in `[0, max)`; zero when `max` is zero
pub fn random_duration(rng: &mut StdRng, max: Duration) -> Duration {
    let max_nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
    if max_nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rng.gen_range(0..max_nanos))
}

/// Random choices for one child span
#[derive(Debug, Clone, PartialEq)]
pub struct ChildPlan {
    /// Depth of the child; the outermost child has the trace depth, the innermost 1
    pub depth: u32,
    /// Simulated work inside the span
    pub duration: Duration,
    /// Number of `extraAttribute-<i>` attributes
    pub extra_attributes: u32,
}

/// Random choices for one trace
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TracePlan {
    /// Length of the child chain
    pub depth: u32,
    /// Depth of the child carrying the risky attribute; 0 for none
    pub risky_depth: u32,
    /// Children from outermost to innermost
    pub children: Vec<ChildPlan>,
}

impl TracePlan {
    /// Sum of the simulated work of all children
    pub fn span_length(&self) -> Duration {
        self.children.iter().map(|c| c.duration).sum()
    }

    /// Total extra attributes across all children
    pub fn extra_attributes(&self) -> u32 {
        self.children.iter().map(|c| c.extra_attributes).sum()
    }
}

/// Builds traces for one worker
#[derive(Debug, Clone)]
pub struct TraceGenerator {
    worker_id: u64,
    service_name: String,
    scope_name: String,
    max_trace_depth: u32,
    max_span_length: Duration,
    risky_attribute_probability: u8,
    max_extra_attributes: u32,
}

impl TraceGenerator {
    /// Create a generator for worker `worker_id` of pool `pool`
    pub fn new(pool: &str, worker_id: u64, config: &WorkerConfig) -> Self {
        Self {
            worker_id,
            service_name: service_name(pool, worker_id),
            scope_name: format!("M:{pool}-W:{worker_id}"),
            max_trace_depth: config.max_trace_depth,
            max_span_length: config.max_span_length,
            risky_attribute_probability: config.risky_attribute_probability,
            max_extra_attributes: config.max_extra_attributes,
        }
    }

    /// Draw the shape of the next trace
    pub fn plan(&self, rng: &mut StdRng) -> TracePlan {
        let depth = if self.max_trace_depth > 0 {
            rng.gen_range(0..self.max_trace_depth)
        } else {
            0
        };

        let risky_depth = if self.risky_attribute_probability > 0
            && depth > 0
            && rng.gen_range(0..100u8) < self.risky_attribute_probability
        {
            rng.gen_range(1..=depth)
        } else {
            0
        };

        let children = (1..=depth)
            .rev()
            .map(|d| ChildPlan {
                depth: d,
                duration: random_duration(rng, self.max_span_length),
                extra_attributes: rng.gen_range(0..=self.max_extra_attributes),
            })
            .collect();

        TracePlan {
            depth,
            risky_depth,
            children,
        }
    }

    /// Simulate the planned span work and assemble the trace
    ///
    /// Returns `None` if `cancel` fires while a span is sleeping.
    pub async fn build(
        &self,
        plan: &TracePlan,
        rng: &mut StdRng,
        cancel: &CancellationToken,
    ) -> Option<SyntheticTrace> {
        let trace_id: [u8; 16] = rng.gen();
        let root_id: [u8; 8] = rng.gen();
        let root_start = Utc::now();

        let mut spans = Vec::with_capacity(plan.children.len() + 1);
        let mut parent = root_id;

        for child in &plan.children {
            let span_id: [u8; 8] = rng.gen();
            let start = Utc::now();

            let mut attributes: Vec<Attribute> = (0..child.extra_attributes)
                .map(|i| Attribute::int(format!("extraAttribute-{i}"), i64::from(i)))
                .collect();
            if plan.risky_depth > 0 && child.depth == plan.risky_depth {
                attributes.push(Attribute::int("risky", self.worker_id as i64));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(child.duration) => {}
            }

            let mut events = Vec::new();
            if child.depth > 1 {
                attributes.push(Attribute::bool("hasChildren", true));
                events.push(SpanEvent {
                    name: "spawning child".to_string(),
                    time: Utc::now(),
                    attributes: vec![Attribute::int("maxDepth", i64::from(child.depth))],
                });
            }

            spans.push(SyntheticSpan {
                trace_id,
                span_id,
                parent_span_id: Some(parent),
                name: child_span_name(self.worker_id, child.depth),
                start,
                end: start,
                attributes,
                events,
            });
            parent = span_id;
        }

        // Nested spans close innermost first, once all work is done
        for span in spans.iter_mut().rev() {
            span.end = Utc::now();
        }
        spans.insert(
            0,
            SyntheticSpan {
                trace_id,
                span_id: root_id,
                parent_span_id: None,
                name: ROOT_SPAN_NAME.to_string(),
                start: root_start,
                end: Utc::now(),
                attributes: Vec::new(),
                events: Vec::new(),
            },
        );

        Some(SyntheticTrace {
            service_name: self.service_name.clone(),
            scope_name: self.scope_name.clone(),
            spans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::AttributeValue;
    use rand::SeedableRng;

    fn config() -> WorkerConfig {
        WorkerConfig::default()
            .with_max_trace_depth(6)
            .with_max_span_length(Duration::from_millis(10))
            .with_max_extra_attributes(3)
    }

    #[test]
    fn test_plan_respects_bounds() {
        let generator = TraceGenerator::new("pool", 7, &config());
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..500 {
            let plan = generator.plan(&mut rng);
            assert!(plan.depth < 6);
            assert_eq!(plan.children.len(), plan.depth as usize);
            assert_eq!(plan.risky_depth, 0);
            for (i, child) in plan.children.iter().enumerate() {
                assert_eq!(child.depth, plan.depth - i as u32);
                assert!(child.duration < Duration::from_millis(10));
                assert!(child.extra_attributes <= 3);
            }
        }
    }

    #[test]
    fn test_risky_depth_always_set_at_full_probability() {
        let generator = TraceGenerator::new(
            "pool",
            7,
            &config().with_risky_attribute_probability(100),
        );
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..500 {
            let plan = generator.plan(&mut rng);
            if plan.depth == 0 {
                assert_eq!(plan.risky_depth, 0);
            } else {
                assert!((1..=plan.depth).contains(&plan.risky_depth));
            }
        }
    }

    #[test]
    fn test_random_duration_zero_max() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(random_duration(&mut rng, Duration::ZERO), Duration::ZERO);
        for _ in 0..100 {
            assert!(random_duration(&mut rng, Duration::from_millis(5)) < Duration::from_millis(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_links_chain_and_tags_attributes() {
        let generator = TraceGenerator::new("pool", 9, &config());
        let plan = TracePlan {
            depth: 3,
            risky_depth: 2,
            children: vec![
                ChildPlan {
                    depth: 3,
                    duration: Duration::from_millis(4),
                    extra_attributes: 2,
                },
                ChildPlan {
                    depth: 2,
                    duration: Duration::from_millis(1),
                    extra_attributes: 0,
                },
                ChildPlan {
                    depth: 1,
                    duration: Duration::ZERO,
                    extra_attributes: 1,
                },
            ],
        };
        assert_eq!(plan.span_length(), Duration::from_millis(5));
        assert_eq!(plan.extra_attributes(), 3);

        let mut rng = StdRng::seed_from_u64(5);
        let trace = generator
            .build(&plan, &mut rng, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(trace.service_name, "benchd-worker.pool.9");
        assert_eq!(trace.spans.len(), 4);
        let root = trace.root().unwrap();
        assert_eq!(root.name, "parentTrace");

        // Every child points at the span before it
        for pair in trace.spans.windows(2) {
            assert_eq!(pair[1].parent_span_id, Some(pair[0].span_id));
            assert_eq!(pair[1].trace_id, root.trace_id);
        }

        let outer = &trace.spans[1];
        assert_eq!(outer.name, "worker.9.child.3");
        assert_eq!(outer.attribute("extraAttribute-1"), Some(&AttributeValue::Int(1)));
        assert_eq!(outer.attribute("hasChildren"), Some(&AttributeValue::Bool(true)));
        assert_eq!(outer.events[0].name, "spawning child");
        assert_eq!(outer.attribute("risky"), None);

        assert_eq!(trace.spans[2].attribute("risky"), Some(&AttributeValue::Int(9)));

        let inner = &trace.spans[3];
        assert_eq!(inner.attribute("hasChildren"), None);
        assert!(inner.events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_stops_on_cancel() {
        let generator = TraceGenerator::new("pool", 1, &config());
        let plan = TracePlan {
            depth: 1,
            risky_depth: 0,
            children: vec![ChildPlan {
                depth: 1,
                duration: Duration::from_secs(60),
                extra_attributes: 0,
            }],
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut rng = StdRng::seed_from_u64(5);
        assert!(generator.build(&plan, &mut rng, &cancel).await.is_none());
    }
}
