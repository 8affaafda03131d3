//! # cxl-fabricmgrd - CXL Fabric Manager
//!
//! Mirrors the topology of a composable CXL fabric simulator into validated
//! port and switch records, and connects or disconnects host ports and
//! device ports on it.
//!
//! ## Responsibilities
//! - Discover resource blocks (ports) and switches
//! - Hydrate host ports (CPU identity), device ports (PCIe ids, CXL memory
//!   capacity) and switches
//! - Reconcile link state from the host side (system resource block list)
//!   and the device side (computer system back-links)
//! - Connect/disconnect under a per-controller link lock
//!
//! ## Error model
//! Remote lookups record an [`ErrorKind`] in an [`ErrorAccumulator`] and
//! return `None`. Each public [`FabricController`] operation resolves the
//! accumulated tags to one [`FabricError`] at its boundary.

mod accumulator;
pub mod config;
pub mod config_file;
mod controller;
mod error;
pub mod paths;
mod port;
pub mod record;
mod remote;
mod switch;
#[cfg(test)]
mod testing;
mod topology;
pub mod transport;

pub use accumulator::{ErrorAccumulator, ErrorKind};
pub use config::ServiceConfig;
pub use config_file::{ConfigFileError, DaemonConfig, LoggingConfig, DEFAULT_CONFIG_PATH};
pub use controller::{FabricController, FabricResponse};
pub use error::{FabricError, FabricResult, RecordError};
pub use port::{port_for, DevicePort, HostPort, PortRecord};
pub use record::{Capacity, DeviceType, PciClassCode, PortData, PortRole, SwitchData};
pub use remote::RemoteClient;
pub use switch::SwitchRecord;
pub use topology::{
    host_to_system_path, is_host_port, member_id, role_of, system_to_host_id, TopologyIndex,
};
pub use transport::{
    HttpMethod, HttpTransport, RemoteRequest, RemoteResponse, Transport, TransportError,
};
