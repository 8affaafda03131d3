//! Error types reported by fabric manager operations.
//!
//! All errors implement `std::error::Error` via `thiserror`. Low-level
//! remote failures are first accumulated as [`crate::ErrorKind`] tags and
//! only turned into a [`FabricError`] at the boundary of a public operation.
//! Not-found and conflict errors are raised directly by the controller.

use thiserror::Error;

/// Result type alias for fabric manager operations.
pub type FabricResult<T> = Result<T, FabricError>;

/// Errors reported by [`crate::FabricController`].
#[derive(Debug, Error)]
pub enum FabricError {
    /// The connection parameters are unusable.
    #[error("Invalid fabric manager configuration")]
    Configuration,

    /// The simulator responded, but its state is not what was expected.
    #[error("Unexpected state of the controlled fabric")]
    ControlObject,

    /// Local processing detected an inconsistency.
    #[error("Internal fabric manager error")]
    Internal,

    /// The host port is not part of the fabric.
    #[error("Host port not found")]
    HostNotFound,

    /// The device port is not part of the fabric.
    #[error("Device port not found")]
    DeviceNotFound,

    /// Neither the host port nor the device port is part of the fabric.
    #[error("Host port and device port not found")]
    HostAndDeviceNotFound,

    /// The requested switch does not exist.
    #[error("Switch not found")]
    SwitchNotFound,

    /// The requested port does not exist.
    #[error("Resource not found")]
    ResourceNotFound,

    /// The device port is linked in a way that contradicts the request.
    #[error("Request conflict: {message}")]
    RequestConflict {
        /// Describes the link actually found.
        message: String,
    },

    /// The simulator did not accept the connect request.
    #[error("Failed to connect host port and device port")]
    ConnectFailure,

    /// The simulator did not accept the disconnect request.
    #[error("Failed to disconnect host port and device port")]
    DisconnectFailure,
}

impl FabricError {
    /// Creates a request conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::RequestConflict {
            message: message.into(),
        }
    }

    /// Returns true for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FabricError::HostNotFound
                | FabricError::DeviceNotFound
                | FabricError::HostAndDeviceNotFound
                | FabricError::SwitchNotFound
                | FabricError::ResourceNotFound
        )
    }
}

/// Violations of the strict record schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A field has a value of the wrong type.
    #[error("Invalid value for {field}: {value}")]
    InvalidField {
        /// Record field name.
        field: &'static str,
        /// Offending value, rendered as JSON.
        value: String,
    },

    /// The capacity parts are missing or inconsistent.
    #[error("Inconsistent capacity: {0}")]
    Capacity(String),

    /// A field that belongs to the other port role was set.
    #[error("{field} is not allowed on a {role} port")]
    RoleMismatch {
        /// Record field name.
        field: &'static str,
        /// Port role as serialized.
        role: &'static str,
    },
}
