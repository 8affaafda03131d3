//! FabricController - topology queries and link changes.
//!
//! Every public operation runs against a fresh [`RemoteClient`] and
//! [`TopologyIndex`], so nothing is cached between calls and concurrent
//! operations never share diagnostic state.
//!
//! Connect and disconnect follow the same sequence:
//!
//! 1. discover port ids and check both targets exist
//! 2. take the link lock
//! 3. read the link state of both ports
//! 4. decide: no-op, conflict, or a single PATCH on the host's system
//! 5. release the lock
//!
//! Reading every port's links also takes the lock, so a full snapshot
//! never interleaves with a link change made through this controller.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::config::ServiceConfig;
use crate::error::{FabricError, FabricResult};
use crate::port::{port_for, DevicePort, HostPort, PortRecord};
use crate::record::{PortData, SwitchData};
use crate::remote::RemoteClient;
use crate::switch::SwitchRecord;
use crate::topology::TopologyIndex;
use crate::transport::{HttpTransport, Transport};

/// Response envelope of the query operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FabricResponse<T> {
    pub data: Vec<T>,
}

impl<T> FabricResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Fabric manager bound to one simulator.
pub struct FabricController {
    config: ServiceConfig,
    transport: Arc<dyn Transport>,
    /// Serializes link reads and changes made through this instance.
    link_lock: Mutex<()>,
}

impl FabricController {
    /// Creates a controller that talks HTTP.
    ///
    /// Incomplete settings are accepted; every operation then fails with
    /// [`FabricError::Configuration`].
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(config: ServiceConfig, transport: Arc<dyn Transport>) -> Self {
        if config.base_url().is_none() || config.service_root.is_none() {
            warn!(config = ?config, "Fabric manager created with incomplete configuration");
        }
        Self {
            config,
            transport,
            link_lock: Mutex::new(()),
        }
    }

    /// Creates a controller from the host's untyped settings mapping.
    pub fn from_value(value: Option<&Value>) -> Self {
        Self::new(ServiceConfig::from_value(value))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn client(&self) -> RemoteClient {
        RemoteClient::new(&self.config, self.transport.clone())
    }

    /// Returns one port, or every port when `target_id` is `None`.
    ///
    /// Every returned port carries the first enumerated switch.
    #[instrument(skip(self))]
    pub async fn get_port_info(
        &self,
        target_id: Option<&str>,
    ) -> FabricResult<FabricResponse<PortData>> {
        let mut remote = self.client();
        let mut topology = TopologyIndex::new();

        let port_ids = topology.discover_port_ids(&mut remote).await;
        if port_ids.is_empty() {
            return Err(remote.resolve_error());
        }
        let switch_ids = topology.discover_switch_ids(&mut remote).await;
        let Some(first_switch) = switch_ids.first() else {
            return Err(remote.resolve_error());
        };
        let switch = Self::load_switch(&mut remote, first_switch, &switch_ids).await;

        if let Some(target_id) = target_id.filter(|t| !t.is_empty()) {
            if !port_ids.iter().any(|id| id == target_id) {
                return Err(FabricError::ResourceNotFound);
            }
            let mut port = Self::load_port(&mut remote, target_id, switch.data()).await;
            // A single port's link state is one remote object, updated
            // atomically by the simulator.
            port.save_link(&mut remote, &port_ids).await;
            return Ok(FabricResponse::new(vec![port.into_data()]));
        }

        let mut ports = Vec::with_capacity(port_ids.len());
        for id in &port_ids {
            ports.push(Self::load_port(&mut remote, id, switch.data()).await);
        }
        {
            let _guard = self.link_lock.lock().await;
            for port in ports.iter_mut() {
                port.save_link(&mut remote, &port_ids).await;
            }
        }
        Ok(FabricResponse::new(
            ports.into_iter().map(|p| p.into_data()).collect(),
        ))
    }

    /// Returns one switch, or every switch when `switch_id` is `None`.
    #[instrument(skip(self))]
    pub async fn get_switch_info(
        &self,
        switch_id: Option<&str>,
    ) -> FabricResult<FabricResponse<SwitchData>> {
        let mut remote = self.client();
        let mut topology = TopologyIndex::new();

        let switch_ids = topology.discover_switch_ids(&mut remote).await;
        if switch_ids.is_empty() {
            return Err(remote.resolve_error());
        }

        if let Some(switch_id) = switch_id.filter(|s| !s.is_empty()) {
            if !switch_ids.iter().any(|id| id == switch_id) {
                return Err(FabricError::SwitchNotFound);
            }
            let switch = Self::load_switch(&mut remote, switch_id, &switch_ids).await;
            return Ok(FabricResponse::new(vec![switch.into_data()]));
        }

        let mut switches = Vec::with_capacity(switch_ids.len());
        for id in &switch_ids {
            switches.push(Self::load_switch(&mut remote, id, &switch_ids).await.into_data());
        }
        Ok(FabricResponse::new(switches))
    }

    /// Links `device_id` to `host_id`.
    ///
    /// Connecting an already linked pair is a no-op. A device linked to any
    /// other host is a conflict.
    #[instrument(skip(self))]
    pub async fn connect(&self, host_id: &str, device_id: &str) -> FabricResult<()> {
        let mut remote = self.client();
        let (mut host, mut device, port_ids) =
            Self::resolve_targets(&mut remote, host_id, device_id).await?;

        let _guard = self.link_lock.lock().await;
        host.save_link(&mut remote, &port_ids).await;
        device.save_link(&mut remote, &port_ids).await;
        let (Some(host_links), Some(device_links)) = (host.link(), device.link()) else {
            return Err(remote.resolve_error());
        };

        if host_links.iter().any(|id| id == device_id) {
            info!(host = %host_id, device = %device_id, "Already connected");
            return Ok(());
        }
        if !device_links.is_empty() {
            return Err(FabricError::conflict(format!(
                "connect: device_id {device_id} linked {device_links:?}"
            )));
        }

        let new_links: Vec<String> = std::iter::once(device_id.to_string())
            .chain(host_links.iter().cloned())
            .collect();
        if !host.change_link(&mut remote, &new_links).await {
            return Err(FabricError::ConnectFailure);
        }
        info!(host = %host_id, device = %device_id, "Connected");
        Ok(())
    }

    /// Unlinks `device_id` from `host_id`.
    ///
    /// Disconnecting an unlinked device is a no-op. A device linked to any
    /// other host is a conflict.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, host_id: &str, device_id: &str) -> FabricResult<()> {
        let mut remote = self.client();
        let (mut host, mut device, port_ids) =
            Self::resolve_targets(&mut remote, host_id, device_id).await?;

        let _guard = self.link_lock.lock().await;
        host.save_link(&mut remote, &port_ids).await;
        device.save_link(&mut remote, &port_ids).await;
        let (Some(host_links), Some(device_links)) = (host.link(), device.link()) else {
            return Err(remote.resolve_error());
        };

        if device_links.is_empty() {
            info!(host = %host_id, device = %device_id, "Already disconnected");
            return Ok(());
        }
        if !host_links.iter().any(|id| id == device_id)
            || !device_links.iter().any(|id| id == host_id)
        {
            return Err(FabricError::conflict(format!(
                "disconnect: device_id {device_id} linked {device_links:?}"
            )));
        }

        let remaining: Vec<String> = host_links
            .iter()
            .filter(|id| id.as_str() != device_id)
            .cloned()
            .collect();
        if !host.change_link(&mut remote, &remaining).await {
            return Err(FabricError::DisconnectFailure);
        }
        info!(host = %host_id, device = %device_id, "Disconnected");
        Ok(())
    }

    /// Discovers the ports and checks that both targets exist with the
    /// expected role. Returns unhydrated records plus all known port ids.
    async fn resolve_targets(
        remote: &mut RemoteClient,
        host_id: &str,
        device_id: &str,
    ) -> FabricResult<(HostPort, DevicePort, Vec<String>)> {
        let mut topology = TopologyIndex::new();
        let port_ids = topology.discover_port_ids(remote).await;
        if port_ids.is_empty() {
            return Err(remote.resolve_error());
        }

        match (topology.contains_host(host_id), topology.contains_device(device_id)) {
            (false, false) => Err(FabricError::HostAndDeviceNotFound),
            (false, true) => Err(FabricError::HostNotFound),
            (true, false) => Err(FabricError::DeviceNotFound),
            (true, true) => Ok((HostPort::new(host_id), DevicePort::new(device_id), port_ids)),
        }
    }

    async fn load_switch(
        remote: &mut RemoteClient,
        switch_id: &str,
        switch_ids: &[String],
    ) -> SwitchRecord {
        let mut switch = SwitchRecord::new(switch_id);
        switch.hydrate(remote).await;
        switch.set_links(switch_ids);
        switch
    }

    /// Hydrates everything but the link state.
    async fn load_port(
        remote: &mut RemoteClient,
        port_id: &str,
        switch: &SwitchData,
    ) -> Box<dyn PortRecord> {
        let mut port = port_for(port_id);
        port.hydrate(remote).await;
        port.save_switch_data(switch);
        port
    }
}

impl std::fmt::Debug for FabricController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FabricController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
