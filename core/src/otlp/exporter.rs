//! OTLP/HTTP protobuf exporter

use std::time::Duration;

use async_trait::async_trait;
use prost::Message;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::trace::SyntheticTrace;
use crate::traits::{ExportError, TraceExporter};

use super::proto::ExportTraceServiceRequest;
use super::TRACES_PATH;

const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Posts each trace as an `ExportTraceServiceRequest` to `http://<target>/v1/traces`
///
/// One exporter (and its connection pool) is shared by all workers of a
/// pool manager.
#[derive(Debug, Clone)]
pub struct OtlpHttpExporter {
    client: Client,
    endpoint: String,
}

impl OtlpHttpExporter {
    /// Create an exporter for `target` (`host:port`, or a full URL)
    ///
    /// The client has no request deadline of its own. Workers bound each
    /// export with their send timeout, so a slow backend is reported as a
    /// send timeout rather than a transport error.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(target: &str) -> Result<Self, ExportError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("tracebench/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint(target),
        })
    }

    /// Full URL traces are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn endpoint(target: &str) -> String {
    let base = target.trim_end_matches('/');
    let base = if base.starts_with("http://") || base.starts_with("https://") {
        base.to_string()
    } else {
        format!("http://{base}")
    };
    if base.ends_with(TRACES_PATH) {
        base
    } else {
        format!("{base}{TRACES_PATH}")
    }
}

#[async_trait]
impl TraceExporter for OtlpHttpExporter {
    fn name(&self) -> &str {
        "otlp-http"
    }

    async fn export(&self, trace: &SyntheticTrace) -> Result<(), ExportError> {
        let body = ExportTraceServiceRequest::from(trace).encode_to_vec();
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
