//! Verification helpers for fabric manager responses

use thiserror::Error;

use cxl_fabricmgrd::{PortData, PortRole};

use crate::fixtures::SimulatedFabric;

/// A mismatch between the expected and observed fabric
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Port {id} not found in response")]
    PortNotFound { id: String },

    #[error("Port {id} link mismatch: expected {expected:?}, got {actual:?}")]
    LinkMismatch {
        id: String,
        expected: Vec<String>,
        actual: Option<Vec<String>>,
    },

    #[error("Link {host} -> {device} is not reported by both ports")]
    OneSidedLink { host: String, device: String },

    #[error("Fabric link mismatch for {host}: expected {expected:?}, got {actual:?}")]
    FabricLinkMismatch {
        host: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Expected {expected} PATCH requests, got {actual}")]
    PatchCount { expected: usize, actual: usize },
}

pub type VerifyResult<T> = Result<T, VerificationError>;

/// Checks over the ports returned by `get_port_info`
pub struct PortVerifier<'a> {
    ports: &'a [PortData],
}

impl<'a> PortVerifier<'a> {
    pub fn new(ports: &'a [PortData]) -> Self {
        Self { ports }
    }

    pub fn port(&self, id: &str) -> VerifyResult<&'a PortData> {
        self.ports
            .iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| VerificationError::PortNotFound { id: id.to_string() })
    }

    pub fn assert_link(&self, id: &str, expected: &[&str]) -> VerifyResult<()> {
        let port = self.port(id)?;
        let actual = port.link().map(<[String]>::to_vec);
        if actual.as_deref().is_some_and(|a| a == expected) {
            return Ok(());
        }
        Err(VerificationError::LinkMismatch {
            id: id.to_string(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
            actual,
        })
    }

    /// Every host -> device link must be reported by the device too, and
    /// the other way round.
    pub fn assert_links_symmetric(&self) -> VerifyResult<()> {
        for port in self.ports {
            for peer in port.link().into_iter().flatten() {
                let other = self.port(peer)?;
                let back = other.link().is_some_and(|l| l.iter().any(|id| id == port.id()));
                if !back {
                    let (host, device) = match port.role() {
                        PortRole::Host => (port.id(), other.id()),
                        PortRole::Device => (other.id(), port.id()),
                    };
                    return Err(VerificationError::OneSidedLink {
                        host: host.to_string(),
                        device: device.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Checks over the simulated fabric's own state
pub struct FabricVerifier<'a> {
    fabric: &'a SimulatedFabric,
}

impl<'a> FabricVerifier<'a> {
    pub fn new(fabric: &'a SimulatedFabric) -> Self {
        Self { fabric }
    }

    pub fn assert_links(&self, host: &str, expected: &[&str]) -> VerifyResult<()> {
        let actual = self.fabric.links_of(host);
        if actual == expected {
            return Ok(());
        }
        Err(VerificationError::FabricLinkMismatch {
            host: host.to_string(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
            actual,
        })
    }

    pub fn assert_patch_count(&self, expected: usize) -> VerifyResult<()> {
        let actual = self.fabric.patch_count();
        if actual == expected {
            return Ok(());
        }
        Err(VerificationError::PatchCount { expected, actual })
    }
}
