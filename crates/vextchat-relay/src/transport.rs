// Transport seam: the single POST the relay makes. `HttpTransport` is the
// reqwest implementation; tests substitute scripted transports.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// A fully built outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: reqwest::Url,
    /// Header name/value pairs, sent in order.
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub timeout: Duration,
}

impl OutboundRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of whatever response came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
            .to_string();
        TransportResponse {
            status,
            reason,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Faults where no HTTP response was obtained.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

/// Sends one request and returns its response, without retrying.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// reqwest-backed transport.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        HttpTransport { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;

        let mut builder = self.http.post(request.url.clone()).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let builder = builder.json(&request.body);

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(e, timeout))?;

        let status = response.status();
        debug!(status = %status, "hook responded");

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(e, timeout))?;

        Ok(TransportResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        })
    }
}

fn classify_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
