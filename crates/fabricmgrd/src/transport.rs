//! Request/response transport to the schema simulator.
//!
//! [`Transport`] is the seam between [`crate::RemoteClient`] and the
//! network. [`HttpTransport`] talks HTTP through `reqwest`; tests plug in
//! in-memory implementations.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Content type sent with every request.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Request methods used by the fabric manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Patch => "patch",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "patch" => Ok(HttpMethod::Patch),
            _ => Err(TransportError::UnknownMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: HttpMethod,
    /// Fully qualified target URL.
    pub url: String,
    /// JSON text, for PATCH.
    pub body: Option<String>,
    pub timeout: Duration,
}

/// Raw response from the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request method is not supported.
    #[error("Invalid method '{0}' specified")]
    UnknownMethod(String),

    /// The target URL is malformed (bad scheme, bad host).
    #[error("Invalid request target {url}: {message}")]
    InvalidTarget { url: String, message: String },

    /// Timeout, refused connection or any other I/O failure.
    #[error("Request to {url} failed: {message}")]
    Failed { url: String, message: String },
}

impl TransportError {
    pub fn invalid_target(url: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidTarget {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn failed(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Failed {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// Executes requests against the simulator.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError>;
}

/// `reqwest` backed transport.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn classify(url: &str, err: reqwest::Error) -> TransportError {
        if err.is_builder() {
            TransportError::invalid_target(url, err)
        } else {
            TransportError::failed(url, err)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::invalid_target(&request.url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::invalid_target(
                &request.url,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(TransportError::invalid_target(&request.url, "missing host"));
        }

        let builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Patch => self.client.patch(url),
        };
        let mut builder = builder
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::classify(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::classify(&request.url, e))?;

        Ok(RemoteResponse { status, body })
    }
}
