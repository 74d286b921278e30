//! OTLP trace messages (`opentelemetry.proto.collector.trace.v1` and its
//! dependencies), reduced to the fields tracebench produces or reads.
//! Field numbers match the upstream `.proto` files, so payloads are
//! interchangeable with any OTLP/HTTP collector.

/// `SPAN_KIND_INTERNAL`
pub const SPAN_KIND_INTERNAL: i32 = 1;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExportTraceServiceRequest {
    #[prost(message, repeated, tag="1")]
    pub resource_spans: ::std::vec::Vec<ResourceSpans>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExportTraceServiceResponse {
    #[prost(message, optional, tag="1")]
    pub partial_success: ::core::option::Option<ExportTracePartialSuccess>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExportTracePartialSuccess {
    #[prost(int64, tag="1")]
    pub rejected_spans: i64,
    #[prost(string, tag="2")]
    pub error_message: std::string::String,
}

/// A collection of ScopeSpans from one Resource.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceSpans {
    #[prost(message, optional, tag="1")]
    pub resource: ::core::option::Option<Resource>,
    #[prost(message, repeated, tag="2")]
    pub scope_spans: ::std::vec::Vec<ScopeSpans>,
    #[prost(string, tag="3")]
    pub schema_url: std::string::String,
}

/// Resource information.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Resource {
    #[prost(message, repeated, tag="1")]
    pub attributes: ::std::vec::Vec<KeyValue>,
    #[prost(uint32, tag="2")]
    pub dropped_attributes_count: u32,
}

/// A collection of Spans produced by one InstrumentationScope.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ScopeSpans {
    #[prost(message, optional, tag="1")]
    pub scope: ::core::option::Option<InstrumentationScope>,
    #[prost(message, repeated, tag="2")]
    pub spans: ::std::vec::Vec<Span>,
    #[prost(string, tag="3")]
    pub schema_url: std::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InstrumentationScope {
    #[prost(string, tag="1")]
    pub name: std::string::String,
    #[prost(string, tag="2")]
    pub version: std::string::String,
    #[prost(message, repeated, tag="3")]
    pub attributes: ::std::vec::Vec<KeyValue>,
    #[prost(uint32, tag="4")]
    pub dropped_attributes_count: u32,
}

/// A single operation within a trace.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Span {
    /// 16-byte trace identifier.
    #[prost(bytes="vec", tag="1")]
    pub trace_id: std::vec::Vec<u8>,
    /// 8-byte span identifier.
    #[prost(bytes="vec", tag="2")]
    pub span_id: std::vec::Vec<u8>,
    #[prost(string, tag="3")]
    pub trace_state: std::string::String,
    /// Empty for root spans.
    #[prost(bytes="vec", tag="4")]
    pub parent_span_id: std::vec::Vec<u8>,
    #[prost(string, tag="5")]
    pub name: std::string::String,
    #[prost(int32, tag="6")]
    pub kind: i32,
    #[prost(fixed64, tag="7")]
    pub start_time_unix_nano: u64,
    #[prost(fixed64, tag="8")]
    pub end_time_unix_nano: u64,
    #[prost(message, repeated, tag="9")]
    pub attributes: ::std::vec::Vec<KeyValue>,
    #[prost(uint32, tag="10")]
    pub dropped_attributes_count: u32,
    #[prost(message, repeated, tag="11")]
    pub events: ::std::vec::Vec<span::Event>,
    #[prost(uint32, tag="12")]
    pub dropped_events_count: u32,
}

pub mod span {
    /// A time-stamped annotation of the span.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Event {
        #[prost(fixed64, tag="1")]
        pub time_unix_nano: u64,
        #[prost(string, tag="2")]
        pub name: std::string::String,
        #[prost(message, repeated, tag="3")]
        pub attributes: ::std::vec::Vec<super::KeyValue>,
        #[prost(uint32, tag="4")]
        pub dropped_attributes_count: u32,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyValue {
    #[prost(string, tag="1")]
    pub key: std::string::String,
    #[prost(message, optional, tag="2")]
    pub value: ::core::option::Option<AnyValue>,
}

/// Scalar attribute value. Array and key/value list values are skipped on decode.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AnyValue {
    #[prost(oneof="any_value::Value", tags="1, 2, 3, 4, 7")]
    pub value: ::core::option::Option<any_value::Value>,
}

pub mod any_value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(string, tag="1")]
        StringValue(std::string::String),
        #[prost(bool, tag="2")]
        BoolValue(bool),
        #[prost(int64, tag="3")]
        IntValue(i64),
        #[prost(double, tag="4")]
        DoubleValue(f64),
        #[prost(bytes, tag="7")]
        BytesValue(std::vec::Vec<u8>),
    }
}
