//! Topology discovery and id translation.
//!
//! Port ids are resource block ids. Host (upstream) ports are the blocks
//! named `ComputeBlock-N`; each maps to the computer system
//! `Systems/System-N`. Every other block is a device (downstream) port.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::accumulator::{ErrorAccumulator, ErrorKind};
use crate::paths::{
    fields, HOST_BLOCK_PREFIX, RESOURCE_BLOCKS_PATH, SWITCHES_PATH, SYSTEM_PATH_PREFIX,
};
use crate::record::PortRole;
use crate::remote::RemoteClient;

/// Returns true if `id` names a host port.
pub fn is_host_port(id: &str) -> bool {
    id.starts_with(HOST_BLOCK_PREFIX)
}

pub fn role_of(id: &str) -> PortRole {
    if is_host_port(id) {
        PortRole::Host
    } else {
        PortRole::Device
    }
}

/// `ComputeBlock-1` -> `Systems/System-1`, relative to the service root.
pub fn host_to_system_path(id: &str) -> String {
    id.replace(HOST_BLOCK_PREFIX, SYSTEM_PATH_PREFIX)
}

/// `System-1` (or any path ending in `-1`) -> `ComputeBlock-1`.
pub fn system_to_host_id(system: &str) -> String {
    let suffix = system.rsplit('-').next().unwrap_or(system);
    format!("{HOST_BLOCK_PREFIX}-{suffix}")
}

/// Last path segment of a reference's `@odata.id`.
///
/// A reference without a string `@odata.id` records a control error.
pub fn member_id(member: &Value, errors: &mut ErrorAccumulator) -> Option<String> {
    match member.get(fields::ODATA_ID).and_then(Value::as_str) {
        Some(path) => Some(path.rsplit('/').next().unwrap_or(path).to_string()),
        None => {
            warn!(member = %member, "Invalid format");
            errors.record(ErrorKind::Control);
            None
        }
    }
}

/// `{"@odata.id": path}`
pub fn reference(path: impl Into<String>) -> Value {
    let mut member = Map::new();
    member.insert(fields::ODATA_ID.to_string(), Value::String(path.into()));
    Value::Object(member)
}

/// Array under `key`, or an empty slice if absent or not an array.
pub(crate) fn collection<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Array under `Links.<key>`.
pub(crate) fn links<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(fields::LINKS)
        .map(|links| collection(links, key))
        .unwrap_or_default()
}

/// Port and switch ids found by the last discovery.
///
/// Built fresh for every public operation and never cached across calls.
#[derive(Debug, Clone, Default)]
pub struct TopologyIndex {
    host_ids: Vec<String>,
    device_ids: Vec<String>,
    switch_ids: Vec<String>,
}

impl TopologyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerates resource blocks and splits them by role.
    ///
    /// Returns all port ids, hosts first. A failed lookup or an empty
    /// collection returns an empty list and leaves the index untouched.
    pub async fn discover_port_ids(&mut self, remote: &mut RemoteClient) -> Vec<String> {
        debug!("entry: discover_port_ids");
        let Some(blocks) = remote.get(RESOURCE_BLOCKS_PATH, true).await else {
            return Vec::new();
        };

        let mut host_ids = Vec::new();
        let mut device_ids = Vec::new();
        for member in collection(&blocks, fields::MEMBERS) {
            let Some(id) = member_id(member, remote.errors_mut()) else {
                continue;
            };
            if id.is_empty() {
                continue;
            }
            if is_host_port(&id) {
                host_ids.push(id);
            } else {
                device_ids.push(id);
            }
        }

        if host_ids.is_empty() && device_ids.is_empty() {
            warn!(blocks = %blocks, "No resource block found from ResourceBlocks");
            remote.record(ErrorKind::Control);
            return Vec::new();
        }
        self.host_ids = host_ids;
        self.device_ids = device_ids;
        self.port_ids(None)
    }

    /// Enumerates switches. An empty result records a control error.
    pub async fn discover_switch_ids(&mut self, remote: &mut RemoteClient) -> Vec<String> {
        debug!("entry: discover_switch_ids");
        let Some(switches) = remote.get(SWITCHES_PATH, true).await else {
            return Vec::new();
        };

        let mut switch_ids = Vec::new();
        for member in collection(&switches, fields::MEMBERS) {
            if let Some(id) = member_id(member, remote.errors_mut()).filter(|id| !id.is_empty()) {
                switch_ids.push(id);
            }
        }

        if switch_ids.is_empty() {
            warn!(switches = %switches, "No switch found from Switches");
            remote.record(ErrorKind::Control);
            return Vec::new();
        }
        self.switch_ids = switch_ids.clone();
        switch_ids
    }

    /// Port ids of one role, or all of them (hosts first) for `None`.
    pub fn port_ids(&self, role: Option<PortRole>) -> Vec<String> {
        match role {
            Some(PortRole::Host) => self.host_ids.clone(),
            Some(PortRole::Device) => self.device_ids.clone(),
            None => self
                .host_ids
                .iter()
                .chain(&self.device_ids)
                .cloned()
                .collect(),
        }
    }

    pub fn host_ids(&self) -> &[String] {
        &self.host_ids
    }

    pub fn device_ids(&self) -> &[String] {
        &self.device_ids
    }

    pub fn switch_ids(&self) -> &[String] {
        &self.switch_ids
    }

    pub fn contains_host(&self, id: &str) -> bool {
        self.host_ids.iter().any(|h| h == id)
    }

    pub fn contains_device(&self, id: &str) -> bool {
        self.device_ids.iter().any(|d| d == id)
    }
}
