//! Transport seam between the engine and the network.
//!
//! The engine never talks to `reqwest` directly. It asks a [`Transport`] to open one
//! streaming request and reads the body as a [`ByteStream`], chunk by chunk, as the
//! bytes arrive. [`HttpTransport`] is the production implementation; tests substitute
//! scripted transports that replay canned bodies.

use crate::retry::{RetryConfig, retry_with_backoff_conditional};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;

/// A pinned, boxed stream of raw response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// One fully described streaming request, produced by the vendor layer.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl WireRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Opens a live, readable byte source for one request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return its response body as an incremental byte stream.
    ///
    /// Implementations must not buffer the whole body before returning.
    async fn open(&self, request: &WireRequest) -> Result<ByteStream>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpTransport {
    /// Build a transport with the given whole-request timeout, in seconds.
    pub fn new(timeout_secs: u64, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, retry })
    }

    async fn open_once(&self, request: &WireRequest) -> Result<reqwest::Response> {
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout()
            } else {
                Error::Http(e)
            }
        })?;

        // Catch authentication failures, rate limits and bad models before streaming
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                log::warn!("failed to read error response body: {}", e);
                "Unknown error (failed to read response body)".to_string()
            });
            return Err(Error::api(Some(status.as_u16()), body));
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &WireRequest) -> Result<ByteStream> {
        log::debug!("opening stream: POST {}", request.url);

        // Only establishing the response is retried; once bytes flow, a failure ends the turn
        let response =
            retry_with_backoff_conditional(self.retry.clone(), || self.open_once(request))
                .await?;

        let body = response.bytes_stream().map(|chunk| {
            chunk.map(|bytes| bytes.to_vec()).map_err(|e| {
                if e.is_timeout() {
                    Error::timeout()
                } else {
                    Error::stream(format!("failed reading response body: {}", e))
                }
            })
        });

        Ok(Box::pin(body))
    }
}
