//! Connection parameters for the schema simulator.
//!
//! The plugin host hands the fabric manager an untyped mapping. Every key
//! is optional, and a key whose value has the wrong type is treated as if
//! it were absent. Missing pieces never prevent construction; they surface
//! as a configuration error on first use.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 1.0;

/// Mapping keys understood by [`ServiceConfig::from_value`].
pub mod keys {
    pub const SERVICE_TYPE: &str = "service_type";
    pub const SERVICE_HOST: &str = "service_host";
    pub const SERVICE_PORT: &str = "service_port";
    pub const SERVICE_ROOT: &str = "service_root";
    pub const TIMEOUT: &str = "timeout";
}

/// Simulator connection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// URL scheme, e.g. `http`.
    #[serde(default)]
    pub service_type: Option<String>,

    /// Simulator host name or address.
    #[serde(default)]
    pub service_host: Option<String>,

    /// Simulator TCP port.
    #[serde(default)]
    pub service_port: Option<i64>,

    /// Service root path, e.g. `/redfish/v1`.
    #[serde(default)]
    pub service_root: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default)]
    pub timeout: Option<f64>,
}

impl ServiceConfig {
    /// Builds a config from the host's untyped mapping.
    ///
    /// `None` or a non-object value yields an empty config.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = value else {
            return Self::default();
        };
        let string = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            service_type: string(keys::SERVICE_TYPE),
            service_host: string(keys::SERVICE_HOST),
            service_port: map.get(keys::SERVICE_PORT).and_then(Value::as_i64),
            service_root: string(keys::SERVICE_ROOT),
            timeout: map.get(keys::TIMEOUT).and_then(Value::as_f64),
        }
    }

    /// `{scheme}://{host}:{port}`, or `None` if any piece is missing or empty.
    pub fn base_url(&self) -> Option<String> {
        let scheme = self.service_type.as_deref().filter(|s| !s.is_empty())?;
        let host = self.service_host.as_deref().filter(|s| !s.is_empty())?;
        let port = self.service_port.filter(|p| *p != 0)?;
        Some(format!("{scheme}://{host}:{port}"))
    }

    /// Effective request timeout.
    ///
    /// A negative, non-finite or unrepresentable value falls back to
    /// [`DEFAULT_TIMEOUT_SECS`].
    pub fn timeout(&self) -> Duration {
        self.timeout
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }
}
