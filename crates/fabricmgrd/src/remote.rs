//! RemoteClient - GET/PATCH access to the schema simulator.
//!
//! Requests never fail with an error value. Every failure is classified
//! into the client's [`ErrorAccumulator`] and the request yields `None`.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::accumulator::{ErrorAccumulator, ErrorKind};
use crate::config::ServiceConfig;
use crate::error::FabricError;
use crate::paths::RESOURCE_BLOCKS_PATH;
use crate::transport::{HttpMethod, RemoteRequest, RemoteResponse, Transport, TransportError};

/// Protocol client bound to one error accumulator.
///
/// A client lives for one public operation; the accumulator it carries is
/// resolved once, at the end of that operation.
pub struct RemoteClient {
    url: Option<String>,
    root: Option<String>,
    timeout: Duration,
    transport: Arc<dyn Transport>,
    errors: ErrorAccumulator,
}

impl RemoteClient {
    /// Creates a client from connection settings.
    ///
    /// A missing scheme, host, port or root leaves the client unusable and
    /// records one configuration error; requests then quietly yield `None`.
    pub fn new(config: &ServiceConfig, transport: Arc<dyn Transport>) -> Self {
        let url = config.base_url();
        let root = config.service_root.clone();
        let mut errors = ErrorAccumulator::new();

        if url.is_none() || root.is_none() {
            warn!(
                scheme = ?config.service_type,
                host = ?config.service_host,
                port = ?config.service_port,
                root = ?config.service_root,
                "Invalid service configuration"
            );
            errors.record(ErrorKind::Configuration);
        }

        Self {
            url,
            root,
            timeout: config.timeout(),
            transport,
            errors,
        }
    }

    /// `{scheme}://{host}:{port}` if the configuration was complete.
    pub fn base_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn errors(&self) -> &ErrorAccumulator {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorAccumulator {
        &mut self.errors
    }

    /// Records a tag found while interpreting a response.
    pub fn record(&mut self, kind: ErrorKind) {
        self.errors.record(kind);
    }

    /// The error to report for everything recorded so far.
    pub fn resolve_error(&self) -> FabricError {
        self.errors.resolve()
    }

    /// Full path of a resource block.
    pub fn resource_path(&self, block_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.root.as_deref().unwrap_or_default(),
            RESOURCE_BLOCKS_PATH,
            block_id
        )
    }

    fn rooted(&self, path: &str) -> String {
        format!("{}/{}", self.root.as_deref().unwrap_or_default(), path)
    }

    /// GETs `path`; with `from_root` the path is relative to the service root.
    pub async fn get(&mut self, path: &str, from_root: bool) -> Option<Value> {
        let path = if from_root {
            self.rooted(path)
        } else {
            path.to_string()
        };
        self.request(HttpMethod::Get.as_str(), &path, None).await
    }

    /// PATCHes `body` to `path`; with `from_root` the path is relative to
    /// the service root. Any parsed response counts as accepted.
    pub async fn patch(&mut self, path: &str, body: &Value, from_root: bool) -> Option<Value> {
        let path = if from_root {
            self.rooted(path)
        } else {
            path.to_string()
        };
        self.request(HttpMethod::Patch.as_str(), &path, Some(body.to_string()))
            .await
    }

    #[instrument(skip(self, body), level = "debug")]
    pub(crate) async fn request(
        &mut self,
        method: &str,
        path: &str,
        body: Option<String>,
    ) -> Option<Value> {
        debug!(body = ?body, "entry: request");
        let base = self.url.as_deref()?;
        let url = format!("{}/{}", base, path.trim_start_matches('/'));

        let method = match method.parse::<HttpMethod>() {
            Ok(method) => method,
            Err(e) => {
                warn!(error = %e, "Unknown request method");
                self.errors.record(ErrorKind::Internal);
                return None;
            }
        };

        let request = RemoteRequest {
            method,
            url,
            body,
            timeout: self.timeout,
        };
        match self.transport.execute(request).await {
            Ok(response) => self.check_response(response),
            Err(e @ TransportError::InvalidTarget { .. }) => {
                warn!(error = %e, "Invalid request target");
                self.errors.record(ErrorKind::Configuration);
                None
            }
            Err(e @ TransportError::UnknownMethod(_)) => {
                warn!(error = %e, "Unknown request method");
                self.errors.record(ErrorKind::Internal);
                None
            }
            Err(e @ TransportError::Failed { .. }) => {
                warn!(error = %e, "Server error case");
                self.errors.record(ErrorKind::Control);
                None
            }
        }
    }

    /// Classifies a response: 5xx is control, any other non-200 is
    /// internal. A 200 body must be a JSON object; anything else, valid
    /// JSON arrays and scalars included, is control.
    fn check_response(&mut self, response: RemoteResponse) -> Option<Value> {
        if response.status >= 500 {
            warn!(status = response.status, "Server error case response status code");
            self.errors.record(ErrorKind::Control);
            return None;
        }
        if response.status != 200 {
            warn!(status = response.status, "Internal error case response status code");
            self.errors.record(ErrorKind::Internal);
            return None;
        }
        match serde_json::from_str::<Value>(&response.body) {
            Ok(value @ Value::Object(_)) => Some(value),
            _ => {
                warn!(text = %response.body, "Invalid response text");
                self.errors.record(ErrorKind::Control);
                None
            }
        }
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("url", &self.url)
            .field("root", &self.root)
            .field("timeout", &self.timeout)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}
