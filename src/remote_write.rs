//! Prometheus remote-write transport
//!
//! Encodes wire samples as a `prometheus.WriteRequest` protobuf, compresses it
//! with the snappy block format and POSTs it to the configured endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prost::Message;

use crate::error::TransportError;
use crate::types::WireSample;

/// Fixed client-side timeout for one write
pub const REMOTE_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

pub const REMOTE_WRITE_VERSION: &str = "0.1.0";

/// Destination for forwarded samples
#[async_trait]
pub trait SampleSink: Send + Sync {
    async fn send(&self, samples: &[WireSample]) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: SampleSink + ?Sized> SampleSink for Arc<T> {
    async fn send(&self, samples: &[WireSample]) -> Result<(), TransportError> {
        (**self).send(samples).await
    }
}

// Subset of prometheus/prompb/remote.proto and types.proto

#[derive(Clone, PartialEq, Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

impl From<&WireSample> for TimeSeries {
    fn from(sample: &WireSample) -> Self {
        TimeSeries {
            labels: vec![Label {
                name: "__name__".to_string(),
                value: sample.name.clone(),
            }],
            samples: vec![Sample {
                value: sample.value,
                timestamp: sample.timestamp_ms,
            }],
        }
    }
}

/// Build the snappy-compressed protobuf body for `samples`
pub fn encode_write_request(samples: &[WireSample]) -> Result<Vec<u8>, TransportError> {
    let request = WriteRequest {
        timeseries: samples.iter().map(TimeSeries::from).collect(),
    };
    let data = request.encode_to_vec();
    snap::raw::Encoder::new()
        .compress_vec(&data)
        .map_err(|e| TransportError::Encoding(e.to_string()))
}

/// HTTP client for a remote-write endpoint
#[derive(Debug, Clone)]
pub struct RemoteWriteClient {
    url: String,
    client: reqwest::Client,
}

impl RemoteWriteClient {
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REMOTE_WRITE_TIMEOUT)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SampleSink for RemoteWriteClient {
    async fn send(&self, samples: &[WireSample]) -> Result<(), TransportError> {
        let body = encode_write_request(samples)?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-protobuf")
            .header(reqwest::header::CONTENT_ENCODING, "snappy")
            .header("X-Prometheus-Remote-Write-Version", REMOTE_WRITE_VERSION)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::RemoteRejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
