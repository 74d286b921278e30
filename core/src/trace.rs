//! In-memory model of a synthetic trace
//!
//! Workers build a [`SyntheticTrace`] per iteration and hand it to a
//! [`TraceExporter`](crate::traits::TraceExporter). The model only covers
//! what the generator produces: a root span, a nested chain of children,
//! scalar attributes and events.

use chrono::{DateTime, Utc};

/// Prefix of the `service.name` resource attribute carried by every trace
pub const SERVICE_NAME_PREFIX: &str = "benchd-worker";

/// Name of the root span of every trace
pub const ROOT_SPAN_NAME: &str = "parentTrace";

/// `service.name` for worker `worker_id` of pool `pool`
///
/// The correlation receiver parses this value back into the worker ID.
pub fn service_name(pool: &str, worker_id: u64) -> String {
    format!("{SERVICE_NAME_PREFIX}.{pool}.{worker_id}")
}

/// Name of the child span at `depth` in a trace emitted by `worker_id`
pub fn child_span_name(worker_id: u64, depth: u32) -> String {
    format!("worker.{worker_id}.child.{depth}")
}

/// Scalar attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// String value
    Str(String),
}

/// Key/value attribute attached to a span, event or resource
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute key
    pub key: String,
    /// Attribute value
    pub value: AttributeValue,
}

impl Attribute {
    /// Integer attribute
    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value: AttributeValue::Int(value),
        }
    }

    /// Boolean attribute
    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            value: AttributeValue::Bool(value),
        }
    }

    /// String attribute
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AttributeValue::Str(value.into()),
        }
    }
}

/// Timestamped event recorded on a span
#[derive(Debug, Clone, PartialEq)]
pub struct SpanEvent {
    /// Event name
    pub name: String,
    /// When the event happened
    pub time: DateTime<Utc>,
    /// Event attributes
    pub attributes: Vec<Attribute>,
}

/// One finished span
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpan {
    /// Trace identifier shared by all spans of the trace
    pub trace_id: [u8; 16],
    /// Span identifier
    pub span_id: [u8; 8],
    /// Parent span identifier; `None` for the root
    pub parent_span_id: Option<[u8; 8]>,
    /// Span name
    pub name: String,
    /// Start time
    pub start: DateTime<Utc>,
    /// End time
    pub end: DateTime<Utc>,
    /// Span attributes
    pub attributes: Vec<Attribute>,
    /// Span events
    pub events: Vec<SpanEvent>,
}

impl SyntheticSpan {
    /// Look up an attribute by key
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| &a.value)
    }
}

/// A complete trace ready for export
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticTrace {
    /// Resource `service.name`
    pub service_name: String,
    /// Instrumentation scope name
    pub scope_name: String,
    /// Spans, root first, then children in nesting order
    pub spans: Vec<SyntheticSpan>,
}

impl SyntheticTrace {
    /// The root span, if any
    pub fn root(&self) -> Option<&SyntheticSpan> {
        self.spans.iter().find(|s| s.parent_span_id.is_none())
    }

    /// Number of spans below the root
    pub fn child_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| s.parent_span_id.is_some())
            .count()
    }
}
