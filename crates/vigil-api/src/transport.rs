//! Transport seam between the pipeline and the network

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::{ClientConfig, API_PREFIX};
use crate::error::ApiError;
use crate::request::{ApiRequest, Body};

/// A response that made it back from the server, whatever its status
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// Parsed JSON body; non-JSON text is kept as a string, an empty body is null
    pub body: Value,
}

impl RawResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// No response was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// `reqwest`-backed transport resolving paths under `<base_url>/api/v1`
#[derive(Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> crate::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidConfig(format!("base_url {}: {}", config.base_url, e)))?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn url_for(&self, request: &ApiRequest) -> std::result::Result<Url, TransportError> {
        let path = request.path.trim_start_matches('/');
        let raw = format!(
            "{}{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            API_PREFIX,
            path
        );

        let mut url = Url::parse(&raw).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let pairs = request.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError> {
        let url = self.url_for(request)?;

        let mut builder = self
            .http_client
            .request(request.method.into(), url.clone())
            .timeout(timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Form(pairs) => builder.form(pairs),
            Body::Bytes { content_type, data } => builder
                .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                .body(data.clone()),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Connect(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(bytes) => parse_body(&bytes),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to read response body");
                Value::Null
            }
        };

        Ok(RawResponse { status, body })
    }
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }

    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
