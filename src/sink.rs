//! Downstream sinks the relay forwards readings to.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use thiserror::Error;

use crate::config::{with_trailing_slash, Config};
use crate::models::Reading;
use crate::pipeline::ProcessingPipeline;

// ---

/// Ingestion endpoint, relative to the API base URL.
pub const INGESTION_SINGLE_PATH: &str = "api/ingestion/single";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid reading payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Accepts one JSON-encoded reading. `Ok` means the reading was taken and
/// the message may be acknowledged.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn forward(&self, body: &str) -> Result<(), SinkError>;
}

/// Shared HTTP client for outbound API calls.
pub fn http_client(config: &Config) -> anyhow::Result<Client> {
    // ---
    let client = Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;
    Ok(client)
}

/// Posts readings to `{api_base_url}api/ingestion/single`.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    endpoint: String,
}

impl HttpSink {
    // ---
    pub fn new(client: Client, api_base_url: &str) -> Self {
        let endpoint = format!(
            "{}{}",
            with_trailing_slash(api_base_url.to_string()),
            INGESTION_SINGLE_PATH
        );
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReadingSink for HttpSink {
    async fn forward(&self, body: &str) -> Result<(), SinkError> {
        // ---
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            tracing::info!("Sensor reading posted to API successfully");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(
            "API returned {} when posting sensor reading: {}",
            status,
            body
        );
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Runs readings through an in-process pipeline instead of the network.
#[derive(Debug, Clone)]
pub struct PipelineSink {
    pipeline: ProcessingPipeline,
}

impl PipelineSink {
    pub fn new(pipeline: ProcessingPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl ReadingSink for PipelineSink {
    async fn forward(&self, body: &str) -> Result<(), SinkError> {
        // ---
        let reading: Reading = serde_json::from_str(body)?;
        let processed = self.pipeline.process_reading(reading);
        tracing::debug!(
            field_id = %processed.original_reading.field_id,
            anomaly = processed.is_anomaly,
            "reading processed in-process"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::TimeSeriesStore;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    #[test]
    fn test_endpoint_join() {
        // ---
        let sink = HttpSink::new(Client::new(), "http://api:5000");
        assert_eq!(sink.endpoint(), "http://api:5000/api/ingestion/single");

        let sink = HttpSink::new(Client::new(), "http://api:5000/v2/");
        assert_eq!(sink.endpoint(), "http://api:5000/v2/api/ingestion/single");
    }

    #[tokio::test]
    async fn test_pipeline_sink_processes_reading() {
        // ---
        let store = Arc::new(TimeSeriesStore::new());
        let sink = PipelineSink::new(ProcessingPipeline::new(Arc::clone(&store)));
        let field_id = Uuid::new_v4();
        let body = serde_json::to_string(
            &Reading::new(field_id).sensor("Humidity", 45.0, "Percent"),
        )
        .unwrap();

        assert_ok!(sink.forward(&body).await);
        assert_eq!(store.len(field_id), 1);
    }

    #[tokio::test]
    async fn test_pipeline_sink_rejects_malformed_body() {
        // ---
        let sink = PipelineSink::new(ProcessingPipeline::new(Arc::new(TimeSeriesStore::new())));
        let err = assert_err!(sink.forward("{not json").await);
        assert!(matches!(err, SinkError::InvalidPayload(_)));
    }
}
