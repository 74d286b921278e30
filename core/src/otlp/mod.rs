//! OTLP/HTTP wire support
//!
//! Conversion of [`SyntheticTrace`] into OTLP protobuf messages, the
//! [`OtlpHttpExporter`] used by workers, and helpers the correlation
//! receiver uses to read `service.name` back out of inbound batches.

mod exporter;
#[allow(missing_docs)]
pub mod proto;

pub use exporter::OtlpHttpExporter;

use chrono::{DateTime, Utc};

use crate::trace::{Attribute, AttributeValue, SyntheticTrace};

use proto::any_value::Value;
use proto::{
    AnyValue, ExportTraceServiceRequest, InstrumentationScope, KeyValue, Resource, ResourceSpans,
    ScopeSpans, Span, SPAN_KIND_INTERNAL,
};

/// Resource attribute key carrying the worker identity
pub const SERVICE_NAME_KEY: &str = "service.name";

/// Path OTLP/HTTP trace exports are posted to
pub const TRACES_PATH: &str = "/v1/traces";

fn unix_nanos(time: DateTime<Utc>) -> u64 {
    time.timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

fn key_value(attribute: &Attribute) -> KeyValue {
    let value = match &attribute.value {
        AttributeValue::Bool(b) => Value::BoolValue(*b),
        AttributeValue::Int(i) => Value::IntValue(*i),
        AttributeValue::Str(s) => Value::StringValue(s.clone()),
    };
    KeyValue {
        key: attribute.key.clone(),
        value: Some(AnyValue { value: Some(value) }),
    }
}

impl From<&SyntheticTrace> for ExportTraceServiceRequest {
    fn from(trace: &SyntheticTrace) -> Self {
        let spans = trace
            .spans
            .iter()
            .map(|span| Span {
                trace_id: span.trace_id.to_vec(),
                span_id: span.span_id.to_vec(),
                parent_span_id: span.parent_span_id.map(|p| p.to_vec()).unwrap_or_default(),
                name: span.name.clone(),
                kind: SPAN_KIND_INTERNAL,
                start_time_unix_nano: unix_nanos(span.start),
                end_time_unix_nano: unix_nanos(span.end),
                attributes: span.attributes.iter().map(key_value).collect(),
                events: span
                    .events
                    .iter()
                    .map(|event| proto::span::Event {
                        time_unix_nano: unix_nanos(event.time),
                        name: event.name.clone(),
                        attributes: event.attributes.iter().map(key_value).collect(),
                        dropped_attributes_count: 0,
                    })
                    .collect(),
                ..Default::default()
            })
            .collect();

        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: Some(Resource {
                    attributes: vec![key_value(&Attribute::string(
                        SERVICE_NAME_KEY,
                        trace.service_name.clone(),
                    ))],
                    dropped_attributes_count: 0,
                }),
                scope_spans: vec![ScopeSpans {
                    scope: Some(InstrumentationScope {
                        name: trace.scope_name.clone(),
                        ..Default::default()
                    }),
                    spans,
                    schema_url: String::new(),
                }],
                schema_url: String::new(),
            }],
        }
    }
}

impl ResourceSpans {
    /// The `service.name` resource attribute, if present and a string
    pub fn service_name(&self) -> Option<&str> {
        self.resource
            .as_ref()?
            .attributes
            .iter()
            .find(|kv| kv.key == SERVICE_NAME_KEY)
            .and_then(|kv| match kv.value.as_ref()?.value.as_ref()? {
                Value::StringValue(s) => Some(s.as_str()),
                _ => None,
            })
    }
}
