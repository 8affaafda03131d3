//! Port records.
//!
//! [`PortRecord`] is the contract shared by the two port roles:
//! [`HostPort`] (upstream, backed by a compute resource block and its
//! computer system) and [`DevicePort`] (downstream, backed by a device
//! resource block). Link state is read differently on each side:
//!
//! - a host port's links are the device blocks listed by its system object
//! - a device port's link is the one system that lists the block, if any
//!
//! Only host ports can change links, by rewriting their system's resource
//! block list.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::accumulator::ErrorKind;
use crate::error::RecordError;
use crate::paths::{
    fields, DEVICE_COLLECTIONS, PCIE_DEVICES_PATH, PCIE_DEVICE_PREFIX, PCIE_FUNCTION_PREFIX,
    PROCESSOR_TYPE_CPU, RESOURCE_BLOCKS_PATH, SIMULATED_DEVICE_ID_KEY,
};
use crate::record::{
    normalize_hex, strict_string, Capacity, DeviceType, PciClassCode, PortData, PortRole,
    SwitchData, PCIE_ID_WIDTH, PCIE_SERIAL_WIDTH,
};
use crate::remote::RemoteClient;
use crate::topology::{
    collection, host_to_system_path, is_host_port, links, member_id, reference, system_to_host_id,
};

const MIB_SHIFT: u32 = 20;

/// Behaviour common to host and device ports.
#[async_trait]
pub trait PortRecord: Send + Sync {
    fn id(&self) -> &str;

    fn role(&self) -> PortRole;

    /// Zone of the port's resource block, known after [`hydrate`](Self::hydrate).
    fn zone(&self) -> Option<&str>;

    fn data(&self) -> &PortData;

    fn data_mut(&mut self) -> &mut PortData;

    fn into_data(self: Box<Self>) -> PortData;

    /// Fetches everything but the link state.
    async fn hydrate(&mut self, remote: &mut RemoteClient);

    /// Resolves the link state against the full set of known port ids.
    ///
    /// Any inconsistency leaves the link unset and records a control error.
    async fn save_link(&mut self, remote: &mut RemoteClient, known_ids: &[String]);

    /// Links, or `None` if they could not be resolved.
    fn link(&self) -> Option<&[String]> {
        self.data().link()
    }

    /// Records the owning switch and derives the fabric id.
    ///
    /// The fabric id is `{manufacturer}-{model}-{serial}-{zone}` and is only
    /// set when all four parts are known.
    fn save_switch_data(&mut self, switch: &SwitchData) {
        let fabric_id = match (
            switch.manufacturer.as_deref(),
            switch.model.as_deref(),
            switch.serial_number.as_deref(),
            self.zone(),
        ) {
            (Some(manufacturer), Some(model), Some(serial), Some(zone))
                if ![manufacturer, model, serial, zone].iter().any(|s| s.is_empty()) =>
            {
                Some(format!("{manufacturer}-{model}-{serial}-{zone}"))
            }
            _ => None,
        };

        let data = self.data_mut();
        data.set_switch_id(switch.switch_id.clone());
        if let Some(fabric_id) = fabric_id {
            data.set_fabric_id(fabric_id);
        }
    }
}

/// Builds the record for `id` according to its role.
pub fn port_for(id: &str) -> Box<dyn PortRecord> {
    if is_host_port(id) {
        Box::new(HostPort::new(id))
    } else {
        Box::new(DevicePort::new(id))
    }
}

/// State and lookups shared by both port roles.
#[derive(Debug, Clone)]
struct PortCore {
    data: PortData,
    zone: Option<String>,
}

impl PortCore {
    fn new(id: &str, role: PortRole) -> Self {
        Self {
            data: PortData::new(id, role),
            zone: None,
        }
    }

    fn block_path(&self) -> String {
        format!("{}/{}", RESOURCE_BLOCKS_PATH, self.data.id())
    }

    /// GETs the port's own resource block.
    async fn fetch_block(&self, remote: &mut RemoteClient) -> Option<Value> {
        remote.get(&self.block_path(), true).await
    }

    /// Keeps the zone if the block belongs to exactly one.
    fn save_zone(&mut self, block: &Value, remote: &mut RemoteClient) {
        if let [zone] = links(block, fields::ZONES) {
            self.zone = member_id(zone, remote.errors_mut());
        }
    }

    /// Reports a rejected record update as an internal error.
    fn check(&self, result: Result<(), RecordError>, remote: &mut RemoteClient) {
        if let Err(e) = result {
            warn!(port = %self.data.id(), error = %e, "Validation error");
            remote.record(ErrorKind::Internal);
        }
    }

    /// Reads an optional string field, reporting a non-string as internal.
    fn read_string(
        &self,
        source: &Value,
        field: &'static str,
        remote: &mut RemoteClient,
    ) -> Option<String> {
        match strict_string(field, source.get(field)) {
            Ok(value) => value,
            Err(e) => {
                self.check(Err(e), remote);
                None
            }
        }
    }
}

/// Upstream port facing a host CPU.
#[derive(Debug, Clone)]
pub struct HostPort {
    core: PortCore,
    system_path: String,
}

impl HostPort {
    pub fn new(id: &str) -> Self {
        Self {
            core: PortCore::new(id, PortRole::Host),
            system_path: host_to_system_path(id),
        }
    }

    /// Path of the host's computer system, relative to the service root.
    pub fn system_path(&self) -> &str {
        &self.system_path
    }

    /// Finds the first processor of the block whose type is CPU.
    async fn find_cpu(&mut self, remote: &mut RemoteClient) -> Option<Value> {
        let block = self.core.fetch_block(remote).await?;
        self.core.save_zone(&block, remote);

        for processor in collection(&block, fields::PROCESSORS) {
            let Some(path) = processor
                .get(fields::ODATA_ID)
                .and_then(Value::as_str)
                .filter(|p| !p.is_empty())
            else {
                continue;
            };
            let Some(cpu) = remote.get(path, false).await else {
                continue;
            };
            if cpu.get(fields::PROCESSOR_TYPE).and_then(Value::as_str) == Some(PROCESSOR_TYPE_CPU) {
                return Some(cpu);
            }
        }

        warn!(port = %self.id(), block = %block, "usp processor not found");
        remote.record(ErrorKind::Control);
        None
    }

    /// Replaces the system's resource block list with `devices` plus this
    /// port's own block.
    ///
    /// Returns true if the simulator accepted the change. The record's own
    /// link state is not touched; call [`PortRecord::save_link`] to observe
    /// the committed state.
    #[instrument(skip(self, remote), fields(port = %self.id()))]
    pub async fn change_link(&self, remote: &mut RemoteClient, devices: &[String]) -> bool {
        let refs: Vec<Value> = devices
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.id()))
            .map(|id| reference(remote.resource_path(id)))
            .collect();

        let mut blocks = Map::new();
        blocks.insert(fields::RESOURCE_BLOCKS.to_string(), Value::Array(refs));
        let mut body = Map::new();
        body.insert(fields::LINKS.to_string(), Value::Object(blocks));
        remote
            .patch(&self.system_path, &Value::Object(body), true)
            .await
            .is_some()
    }
}

#[async_trait]
impl PortRecord for HostPort {
    fn id(&self) -> &str {
        self.core.data.id()
    }

    fn role(&self) -> PortRole {
        PortRole::Host
    }

    fn zone(&self) -> Option<&str> {
        self.core.zone.as_deref()
    }

    fn data(&self) -> &PortData {
        &self.core.data
    }

    fn data_mut(&mut self) -> &mut PortData {
        &mut self.core.data
    }

    fn into_data(self: Box<Self>) -> PortData {
        self.core.data
    }

    async fn hydrate(&mut self, remote: &mut RemoteClient) {
        debug!(port = %self.id(), "entry: hydrate host port");
        let Some(cpu) = self.find_cpu(remote).await else {
            return;
        };

        let model = self.core.read_string(&cpu, fields::MODEL, remote);
        let manufacturer = self.core.read_string(&cpu, fields::MANUFACTURER, remote);
        let serial = self.core.read_string(&cpu, fields::SERIAL_NUMBER, remote);

        let result = self.core.data.set_cpu_model(model);
        self.core.check(result, remote);
        let result = self.core.data.set_cpu_manufacturer(manufacturer);
        self.core.check(result, remote);
        let result = self.core.data.set_cpu_serial_number(serial);
        self.core.check(result, remote);
    }

    async fn save_link(&mut self, remote: &mut RemoteClient, known_ids: &[String]) {
        let Some(system) = remote.get(&self.system_path, true).await else {
            return;
        };

        let mut devices = Vec::new();
        for block in links(&system, fields::RESOURCE_BLOCKS) {
            let Some(id) = member_id(block, remote.errors_mut()) else {
                return;
            };
            if !known_ids.contains(&id) {
                warn!(port = %self.id(), block = %id, "Invalid resource block not in known ports");
                remote.record(ErrorKind::Control);
                return;
            }
            if !is_host_port(&id) {
                devices.push(id);
            }
        }
        self.core.data.set_link(devices);
    }
}

/// Downstream port facing a PCIe or CXL memory device.
#[derive(Debug, Clone)]
pub struct DevicePort {
    core: PortCore,
}

impl DevicePort {
    pub fn new(id: &str) -> Self {
        Self {
            core: PortCore::new(id, PortRole::Device),
        }
    }

    /// Path of the single device referenced by the block.
    async fn device_path(&mut self, remote: &mut RemoteClient) -> Option<String> {
        let block = self.core.fetch_block(remote).await?;
        self.core.save_zone(&block, remote);

        let found: Vec<&Value> = DEVICE_COLLECTIONS
            .iter()
            .flat_map(|kind| collection(&block, kind))
            .collect();
        let [device] = found.as_slice() else {
            warn!(
                port = %self.id(),
                count = found.len(),
                block = %block,
                "dsp target device count is not 1"
            );
            remote.record(ErrorKind::Control);
            return None;
        };

        match device.get(fields::ODATA_ID).and_then(Value::as_str) {
            Some(path) if !path.is_empty() => Some(path.to_string()),
            _ => {
                warn!(port = %self.id(), device = %device, "Invalid format");
                remote.record(ErrorKind::Control);
                None
            }
        }
    }

    async fn hydrate_pcie(
        &mut self,
        remote: &mut RemoteClient,
        pcie_device: &Value,
        serial: String,
        device_suffix: &str,
    ) {
        let result = self.core.data.set_pcie_device_serial_number(Some(serial));
        self.core.check(result, remote);
        let result = self.core.data.set_device_type(DeviceType::Pcie);
        self.core.check(result, remote);

        let Some(functions) = pcie_device
            .get(fields::PCIE_FUNCTIONS)
            .and_then(|f| f.get(fields::ODATA_ID))
            .and_then(Value::as_str)
        else {
            warn!(port = %self.id(), device = %pcie_device, "PCIe functions not found");
            remote.record(ErrorKind::Control);
            return;
        };
        let path = format!("{functions}/{PCIE_FUNCTION_PREFIX}{device_suffix}");
        let Some(function) = remote.get(&path, false).await else {
            return;
        };

        let hex = |field: &str, width: usize| {
            function
                .get(field)
                .and_then(Value::as_str)
                .and_then(|v| normalize_hex(v, width))
        };
        let device_id = hex(fields::DEVICE_ID, PCIE_ID_WIDTH);
        let vendor_id = hex(fields::VENDOR_ID, PCIE_ID_WIDTH);
        let class_code = function
            .get(fields::CLASS_CODE)
            .and_then(Value::as_str)
            .and_then(PciClassCode::from_hex);

        let result = self.core.data.set_pcie_device_id(device_id);
        self.core.check(result, remote);
        let result = self.core.data.set_pcie_vendor_id(vendor_id);
        self.core.check(result, remote);
        let result = self.core.data.set_pci_class_code(class_code);
        self.core.check(result, remote);
    }

    async fn hydrate_memory(&mut self, remote: &mut RemoteClient, device_path: &str) {
        let Some(memory) = remote.get(device_path, false).await else {
            return;
        };

        let mut keys = Map::new();
        keys.insert(
            SIMULATED_DEVICE_ID_KEY.to_string(),
            memory.get(fields::SERIAL_NUMBER).cloned().unwrap_or(Value::Null),
        );
        let result = self.core.data.set_device_keys(keys);
        self.core.check(result, remote);

        let Some(cxl) = memory.get(fields::CXL).filter(|c| c.is_object()) else {
            return;
        };
        let size = |field: &str| cxl.get(field).and_then(Value::as_i64).unwrap_or(0);
        let volatile = size(fields::STAGED_VOLATILE_SIZE_MIB);
        let persistent = size(fields::STAGED_NON_VOLATILE_SIZE_MIB);
        if volatile < 0 || persistent < 0 || (volatile == 0 && persistent == 0) {
            return;
        }

        let bytes = |mib: i64| mib.checked_mul(1 << MIB_SHIFT);
        let capacity = match (bytes(volatile), bytes(persistent)) {
            (Some(v), Some(p)) => Capacity::from_parts(Some(v), Some(p), None),
            _ => Err(RecordError::Capacity(format!(
                "volatile={volatile}MiB persistent={persistent}MiB"
            ))),
        };
        match capacity {
            Ok(capacity) => {
                let result = self
                    .core
                    .data
                    .set_capacity(capacity)
                    .and_then(|()| self.core.data.set_device_type(DeviceType::CxlType3));
                self.core.check(result, remote);
            }
            Err(e) => self.core.check(Err(e), remote),
        }
    }
}

#[async_trait]
impl PortRecord for DevicePort {
    fn id(&self) -> &str {
        self.core.data.id()
    }

    fn role(&self) -> PortRole {
        PortRole::Device
    }

    fn zone(&self) -> Option<&str> {
        self.core.zone.as_deref()
    }

    fn data(&self) -> &PortData {
        &self.core.data
    }

    fn data_mut(&mut self) -> &mut PortData {
        &mut self.core.data
    }

    fn into_data(self: Box<Self>) -> PortData {
        self.core.data
    }

    /// A device with a well-formed 8-byte PCIe serial number is a PCIe
    /// device; anything else is read as CXL memory.
    async fn hydrate(&mut self, remote: &mut RemoteClient) {
        debug!(port = %self.id(), "entry: hydrate device port");
        let Some(device_path) = self.device_path(remote).await else {
            return;
        };
        let suffix = device_path
            .rsplit('-')
            .next()
            .unwrap_or(&device_path)
            .to_string();

        let pcie_path = format!("{PCIE_DEVICES_PATH}/{PCIE_DEVICE_PREFIX}{suffix}");
        let Some(pcie_device) = remote.get(&pcie_path, true).await else {
            return;
        };

        let serial = pcie_device
            .get(fields::SERIAL_NUMBER)
            .and_then(Value::as_str)
            .and_then(|s| normalize_hex(s, PCIE_SERIAL_WIDTH));
        match serial {
            Some(serial) => {
                self.hydrate_pcie(remote, &pcie_device, serial, &suffix)
                    .await
            }
            None => self.hydrate_memory(remote, &device_path).await,
        }
    }

    async fn save_link(&mut self, remote: &mut RemoteClient, known_ids: &[String]) {
        let Some(block) = self.core.fetch_block(remote).await else {
            return;
        };

        let mut hosts = Vec::new();
        for system in links(&block, fields::COMPUTER_SYSTEMS) {
            let Some(system_id) = member_id(system, remote.errors_mut()) else {
                return;
            };
            let host = system_to_host_id(&system_id);
            if !known_ids.contains(&host) {
                warn!(
                    port = %self.id(),
                    block = %host,
                    "Invalid resource block not in known ports"
                );
                remote.record(ErrorKind::Control);
                return;
            }
            hosts.push(host);
        }

        if hosts.len() > 1 {
            warn!(port = %self.id(), hosts = ?hosts, "dsp link failed, device is multi-homed");
            remote.record(ErrorKind::Control);
            return;
        }
        self.core.data.set_link(hosts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::ErrorKind;
    use crate::testing::{
        block_path, block_ref, odata, service_config, system_path, system_ref, ScriptedTransport,
    };
    use crate::transport::HttpMethod;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn client(transport: &Arc<ScriptedTransport>) -> RemoteClient {
        RemoteClient::new(&service_config(), transport.clone())
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn known() -> Vec<String> {
        ids(&["ComputeBlock-1", "ComputeBlock-2", "DeviceBlock-3", "DeviceBlock-4"])
    }

    fn switch() -> SwitchData {
        SwitchData {
            switch_id: "CXL-1".to_string(),
            manufacturer: Some("Acme".to_string()),
            model: Some("CXL-SW".to_string()),
            serial_number: Some("SN-1".to_string()),
            link: Some(vec![]),
        }
    }

    fn script_host_block(transport: &ScriptedTransport) {
        transport.respond(
            &block_path("ComputeBlock-1"),
            json!({
                "Processors": [
                    odata("/redfish/v1/Systems/System-1/Processors/GPU-1"),
                    {"Name": "no reference"},
                    odata("/redfish/v1/Systems/System-1/Processors/CPU-1"),
                ],
                "Links": {"Zones": [odata("/redfish/v1/CompositionService/ResourceZones/Zone-1")]},
            }),
        );
        transport.respond(
            "redfish/v1/Systems/System-1/Processors/GPU-1",
            json!({"ProcessorType": "GPU", "Model": "GPU"}),
        );
        transport.respond(
            "redfish/v1/Systems/System-1/Processors/CPU-1",
            json!({
                "ProcessorType": "CPU",
                "Manufacturer": "Intel",
                "Model": "Xeon",
                "SerialNumber": "CPU-SN-1",
            }),
        );
    }

    const PCIE_4_FUNCTIONS: &str = "/redfish/v1/Chassis/Chassis-1/PCIeDevices/PCIe-4/PCIeFunctions";

    fn script_device_block(transport: &ScriptedTransport, id: &str, device: Value) {
        transport.respond(
            &block_path(id),
            json!({
                "Memory": [device],
                "Links": {
                    "Zones": [odata("/redfish/v1/CompositionService/ResourceZones/Zone-1")],
                    "ComputerSystems": [],
                },
            }),
        );
    }

    #[test]
    fn test_port_for_role() {
        assert_eq!(port_for("ComputeBlock-1").role(), PortRole::Host);
        assert_eq!(port_for("DeviceBlock-3").role(), PortRole::Device);
        assert!(port_for("DeviceBlock-3").link().is_none());
    }

    #[tokio::test]
    async fn test_host_hydrate_finds_first_cpu() {
        let transport = ScriptedTransport::new();
        script_host_block(&transport);
        let mut remote = client(&transport);
        let mut port = HostPort::new("ComputeBlock-1");
        port.hydrate(&mut remote).await;

        assert_eq!(port.zone(), Some("Zone-1"));
        assert_eq!(port.data().cpu_manufacturer(), Some("Intel"));
        assert_eq!(port.data().cpu_model(), Some("Xeon"));
        assert_eq!(port.data().cpu_serial_number(), Some("CPU-SN-1"));
        assert!(port.data().device_type().is_none());
        assert!(remote.errors().is_empty());
    }

    #[tokio::test]
    async fn test_host_hydrate_without_cpu() {
        let transport = ScriptedTransport::new();
        transport.respond(
            &block_path("ComputeBlock-1"),
            json!({"Processors": [odata("/redfish/v1/Systems/System-1/Processors/GPU-1")]}),
        );
        transport.respond(
            "redfish/v1/Systems/System-1/Processors/GPU-1",
            json!({"ProcessorType": "GPU"}),
        );
        let mut remote = client(&transport);
        let mut port = HostPort::new("ComputeBlock-1");
        port.hydrate(&mut remote).await;

        assert!(port.data().cpu_model().is_none());
        assert!(port.zone().is_none());
        assert_eq!(remote.errors().errors(), &[ErrorKind::Control]);
    }

    #[tokio::test]
    async fn test_host_hydrate_scan_continues_after_failed_lookup() {
        let transport = ScriptedTransport::new();
        transport.respond(
            &block_path("ComputeBlock-1"),
            json!({"Processors": [
                odata("/redfish/v1/Systems/System-1/Processors/CPU-0"),
                odata("/redfish/v1/Systems/System-1/Processors/CPU-1"),
            ]}),
        );
        transport.respond(
            "redfish/v1/Systems/System-1/Processors/CPU-1",
            json!({"ProcessorType": "CPU", "Model": "Xeon"}),
        );
        let mut remote = client(&transport);
        let mut port = HostPort::new("ComputeBlock-1");
        port.hydrate(&mut remote).await;

        assert_eq!(port.data().cpu_model(), Some("Xeon"));
        assert!(port.data().cpu_manufacturer().is_none());
        assert_eq!(remote.errors().errors(), &[ErrorKind::Internal]);
    }

    #[tokio::test]
    async fn test_host_hydrate_invalid_cpu_field() {
        let transport = ScriptedTransport::new();
        transport.respond(
            &block_path("ComputeBlock-1"),
            json!({"Processors": [odata("/redfish/v1/Systems/System-1/Processors/CPU-1")]}),
        );
        transport.respond(
            "redfish/v1/Systems/System-1/Processors/CPU-1",
            json!({"ProcessorType": "CPU", "Model": 7, "Manufacturer": "Intel"}),
        );
        let mut remote = client(&transport);
        let mut port = HostPort::new("ComputeBlock-1");
        port.hydrate(&mut remote).await;

        assert!(port.data().cpu_model().is_none());
        assert_eq!(port.data().cpu_manufacturer(), Some("Intel"));
        assert_eq!(remote.errors().errors(), &[ErrorKind::Internal]);
    }

    #[tokio::test]
    async fn test_host_save_link_keeps_devices() {
        let transport = ScriptedTransport::new();
        transport.script_host_links("ComputeBlock-1", &["DeviceBlock-3", "DeviceBlock-4"]);
        let mut remote = client(&transport);
        let mut port = HostPort::new("ComputeBlock-1");
        port.save_link(&mut remote, &known()).await;

        assert_eq!(port.link(), Some(&ids(&["DeviceBlock-3", "DeviceBlock-4"])[..]));
        assert!(remote.errors().is_empty());
    }

    #[tokio::test]
    async fn test_host_save_link_unknown_block() {
        let transport = ScriptedTransport::new();
        transport.script_host_links("ComputeBlock-1", &["DeviceBlock-9"]);
        let mut remote = client(&transport);
        let mut port = HostPort::new("ComputeBlock-1");
        port.save_link(&mut remote, &known()).await;

        assert!(port.link().is_none());
        assert_eq!(remote.errors().errors(), &[ErrorKind::Control]);
    }

    #[tokio::test]
    async fn test_host_save_link_bad_reference() {
        let transport = ScriptedTransport::new();
        transport.respond(
            &system_path("ComputeBlock-1"),
            json!({"Links": {"ResourceBlocks": [block_ref("ComputeBlock-1"), {"Id": 3}]}}),
        );
        let mut remote = client(&transport);
        let mut port = HostPort::new("ComputeBlock-1");
        port.save_link(&mut remote, &known()).await;

        assert!(port.link().is_none());
        assert_eq!(remote.errors().errors(), &[ErrorKind::Control]);
    }

    #[tokio::test]
    async fn test_host_save_link_system_missing() {
        let transport = ScriptedTransport::new();
        let mut remote = client(&transport);
        let mut port = HostPort::new("ComputeBlock-1");
        port.save_link(&mut remote, &known()).await;

        assert!(port.link().is_none());
        assert_eq!(remote.errors().errors(), &[ErrorKind::Internal]);
    }

    #[tokio::test]
    async fn test_change_link_body() {
        let transport = ScriptedTransport::new();
        transport.respond_patch(&system_path("ComputeBlock-1"), json!({}));
        let mut remote = client(&transport);
        let port = HostPort::new("ComputeBlock-1");

        assert!(port.change_link(&mut remote, &ids(&["DeviceBlock-3"])).await);
        assert!(port.link().is_none());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Patch);
        assert_eq!(
            requests[0].url,
            "http://localhost:5555/redfish/v1/Systems/System-1"
        );
        let body: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"Links": {"ResourceBlocks": [
                block_ref("DeviceBlock-3"),
                block_ref("ComputeBlock-1"),
            ]}})
        );
    }

    #[tokio::test]
    async fn test_change_link_rejected() {
        let transport = ScriptedTransport::new();
        let mut remote = client(&transport);
        let port = HostPort::new("ComputeBlock-1");

        assert!(!port.change_link(&mut remote, &[]).await);
        assert_eq!(remote.errors().errors(), &[ErrorKind::Internal]);
    }

    #[tokio::test]
    async fn test_device_hydrate_memory_capacity() {
        let transport = ScriptedTransport::new();
        script_device_block(
            &transport,
            "DeviceBlock-3",
            odata("/redfish/v1/Chassis/Chassis-1/Memory/Memory-3"),
        );
        transport.respond("redfish/v1/Chassis/Chassis-1/PCIeDevices/PCIe-3", json!({}));
        transport.respond(
            "redfish/v1/Chassis/Chassis-1/Memory/Memory-3",
            json!({
                "SerialNumber": "MEM-SN-3",
                "CXL": {"StagedVolatileSizeMiB": 2, "StagedNonVolatileSizeMiB": 1},
            }),
        );
        let mut remote = client(&transport);
        let mut port = DevicePort::new("DeviceBlock-3");
        port.hydrate(&mut remote).await;

        let capacity = port.data().capacity().unwrap();
        assert_eq!(capacity.volatile(), 2_097_152);
        assert_eq!(capacity.persistent(), 1_048_576);
        assert_eq!(capacity.total(), 3_145_728);
        assert_eq!(port.data().device_type(), Some(DeviceType::CxlType3));
        assert_eq!(
            port.data().device_keys().get("SimulatedDeviceID"),
            Some(&json!("MEM-SN-3"))
        );
        assert_eq!(port.zone(), Some("Zone-1"));
        assert!(remote.errors().is_empty());
    }

    #[tokio::test]
    async fn test_device_hydrate_memory_without_sizes() {
        for cxl in [
            json!({"StagedVolatileSizeMiB": 0, "StagedNonVolatileSizeMiB": 0}),
            json!({"StagedVolatileSizeMiB": -1, "StagedNonVolatileSizeMiB": 4}),
            json!({"StagedVolatileSizeMiB": "2", "StagedNonVolatileSizeMiB": 1.5}),
        ] {
            let transport = ScriptedTransport::new();
            script_device_block(
                &transport,
                "DeviceBlock-3",
                odata("/redfish/v1/Chassis/Chassis-1/Memory/Memory-3"),
            );
            transport.respond("redfish/v1/Chassis/Chassis-1/PCIeDevices/PCIe-3", json!({}));
            transport.respond(
                "redfish/v1/Chassis/Chassis-1/Memory/Memory-3",
                json!({"SerialNumber": "MEM-SN-3", "CXL": cxl}),
            );
            let mut remote = client(&transport);
            let mut port = DevicePort::new("DeviceBlock-3");
            port.hydrate(&mut remote).await;

            assert!(port.data().capacity().is_none(), "{cxl}");
            assert!(port.data().device_type().is_none(), "{cxl}");
            assert!(!port.data().device_keys().is_empty());
            assert!(remote.errors().is_empty());
        }
    }

    #[tokio::test]
    async fn test_device_hydrate_pcie() {
        let transport = ScriptedTransport::new();
        script_device_block(
            &transport,
            "DeviceBlock-4",
            odata("/redfish/v1/Chassis/Chassis-1/NetworkAdapters/NIC-4"),
        );
        transport.respond(
            "redfish/v1/Chassis/Chassis-1/PCIeDevices/PCIe-4",
            json!({
                "SerialNumber": "0x0123456789ABCDEF",
                "PCIeFunctions": odata(PCIE_4_FUNCTIONS),
            }),
        );
        transport.respond(
            "redfish/v1/Chassis/Chassis-1/PCIeDevices/PCIe-4/PCIeFunctions/PCIeF-4",
            json!({"DeviceId": "0x1000", "VendorId": "1AF4", "ClassCode": "0x020000"}),
        );
        let mut remote = client(&transport);
        let mut port = DevicePort::new("DeviceBlock-4");
        port.hydrate(&mut remote).await;

        let data = port.data();
        assert_eq!(data.device_type(), Some(DeviceType::Pcie));
        assert_eq!(data.pcie_device_serial_number(), Some("0123456789abcdef"));
        assert_eq!(data.pcie_device_id(), Some("1000"));
        assert_eq!(data.pcie_vendor_id(), Some("1af4"));
        assert_eq!(
            data.pci_class_code(),
            Some(PciClassCode {
                base: 0x02,
                sub: 0x00,
                prog: 0x00
            })
        );
        assert!(data.capacity().is_none());
        assert!(remote.errors().is_empty());
    }

    #[tokio::test]
    async fn test_device_hydrate_pcie_malformed_ids() {
        let transport = ScriptedTransport::new();
        script_device_block(
            &transport,
            "DeviceBlock-4",
            odata("/redfish/v1/Chassis/Chassis-1/NetworkAdapters/NIC-4"),
        );
        transport.respond(
            "redfish/v1/Chassis/Chassis-1/PCIeDevices/PCIe-4",
            json!({
                "SerialNumber": "0123456789abcdef",
                "PCIeFunctions": odata(PCIE_4_FUNCTIONS),
            }),
        );
        transport.respond(
            "redfish/v1/Chassis/Chassis-1/PCIeDevices/PCIe-4/PCIeFunctions/PCIeF-4",
            json!({"DeviceId": "10000", "VendorId": 6900, "ClassCode": "0200"}),
        );
        let mut remote = client(&transport);
        let mut port = DevicePort::new("DeviceBlock-4");
        port.hydrate(&mut remote).await;

        let data = port.data();
        assert_eq!(data.device_type(), Some(DeviceType::Pcie));
        assert!(data.pcie_device_id().is_none());
        assert!(data.pcie_vendor_id().is_none());
        assert!(data.pci_class_code().is_none());
        assert!(remote.errors().is_empty());
    }

    #[tokio::test]
    async fn test_device_hydrate_pcie_without_functions() {
        let transport = ScriptedTransport::new();
        script_device_block(
            &transport,
            "DeviceBlock-4",
            odata("/redfish/v1/Chassis/Chassis-1/NetworkAdapters/NIC-4"),
        );
        transport.respond(
            "redfish/v1/Chassis/Chassis-1/PCIeDevices/PCIe-4",
            json!({"SerialNumber": "0123456789abcdef"}),
        );
        let mut remote = client(&transport);
        let mut port = DevicePort::new("DeviceBlock-4");
        port.hydrate(&mut remote).await;

        let data = port.data();
        assert_eq!(data.device_type(), Some(DeviceType::Pcie));
        assert_eq!(data.pcie_device_serial_number(), Some("0123456789abcdef"));
        assert!(data.pcie_device_id().is_none());
        assert!(data.pcie_vendor_id().is_none());
        assert!(data.pci_class_code().is_none());
        assert_eq!(remote.errors().errors(), &[ErrorKind::Control]);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_device_hydrate_pcie_device_lookup_failure() {
        for (status, kind) in [(503, ErrorKind::Control), (404, ErrorKind::Internal)] {
            let transport = ScriptedTransport::new();
            script_device_block(
                &transport,
                "DeviceBlock-4",
                odata("/redfish/v1/Chassis/Chassis-1/NetworkAdapters/NIC-4"),
            );
            transport.respond_status(
                "redfish/v1/Chassis/Chassis-1/PCIeDevices/PCIe-4",
                status,
                r#"{"error":"unavailable"}"#,
            );
            let mut remote = client(&transport);
            let mut port = DevicePort::new("DeviceBlock-4");
            port.hydrate(&mut remote).await;

            let data = port.data();
            assert!(data.device_type().is_none(), "{status}");
            assert!(data.pcie_device_serial_number().is_none(), "{status}");
            assert!(data.capacity().is_none(), "{status}");
            assert!(data.device_keys().is_empty(), "{status}");
            assert_eq!(remote.errors().errors(), &[kind], "{status}");
        }
    }

    #[tokio::test]
    async fn test_device_hydrate_pcie_function_lookup_failure() {
        let transport = ScriptedTransport::new();
        script_device_block(
            &transport,
            "DeviceBlock-4",
            odata("/redfish/v1/Chassis/Chassis-1/NetworkAdapters/NIC-4"),
        );
        transport.respond(
            "redfish/v1/Chassis/Chassis-1/PCIeDevices/PCIe-4",
            json!({
                "SerialNumber": "0123456789abcdef",
                "PCIeFunctions": odata(PCIE_4_FUNCTIONS),
            }),
        );
        let mut remote = client(&transport);
        let mut port = DevicePort::new("DeviceBlock-4");
        port.hydrate(&mut remote).await;

        let data = port.data();
        assert_eq!(data.pcie_device_serial_number(), Some("0123456789abcdef"));
        assert!(data.pcie_device_id().is_none());
        assert_eq!(remote.errors().errors(), &[ErrorKind::Internal]);
    }

    #[tokio::test]
    async fn test_device_hydrate_requires_one_device() {
        let transport = ScriptedTransport::new();
        transport.respond(
            &block_path("DeviceBlock-3"),
            json!({
                "Memory": [odata("/redfish/v1/Chassis/Chassis-1/Memory/Memory-3")],
                "Drives": [odata("/redfish/v1/Chassis/Chassis-1/Drives/Drive-3")],
            }),
        );
        let mut remote = client(&transport);
        let mut port = DevicePort::new("DeviceBlock-3");
        port.hydrate(&mut remote).await;

        assert!(port.data().device_type().is_none());
        assert_eq!(remote.errors().errors(), &[ErrorKind::Control]);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_device_save_link() {
        let transport = ScriptedTransport::new();
        transport.script_device_links("DeviceBlock-3", &["ComputeBlock-2"]);
        let mut remote = client(&transport);
        let mut port = DevicePort::new("DeviceBlock-3");
        port.save_link(&mut remote, &known()).await;

        assert_eq!(port.link(), Some(&ids(&["ComputeBlock-2"])[..]));

        transport.script_device_links("DeviceBlock-3", &[]);
        let mut port = DevicePort::new("DeviceBlock-3");
        port.save_link(&mut remote, &known()).await;
        assert_eq!(port.link(), Some(&[][..]));
        assert!(remote.errors().is_empty());
    }

    #[tokio::test]
    async fn test_device_save_link_multi_homed() {
        let transport = ScriptedTransport::new();
        transport.script_device_links("DeviceBlock-3", &["ComputeBlock-1", "ComputeBlock-2"]);
        let mut remote = client(&transport);
        let mut port = DevicePort::new("DeviceBlock-3");
        port.save_link(&mut remote, &known()).await;

        assert!(port.link().is_none());
        assert_eq!(remote.errors().errors(), &[ErrorKind::Control]);
    }

    #[tokio::test]
    async fn test_device_save_link_unknown_host() {
        let transport = ScriptedTransport::new();
        transport.respond(
            &block_path("DeviceBlock-3"),
            json!({"Links": {"ComputerSystems": [system_ref("ComputeBlock-7")]}}),
        );
        let mut remote = client(&transport);
        let mut port = DevicePort::new("DeviceBlock-3");
        port.save_link(&mut remote, &known()).await;

        assert!(port.link().is_none());
        assert_eq!(remote.errors().errors(), &[ErrorKind::Control]);
    }

    #[test]
    fn test_save_switch_data_fabric_id() {
        let mut port = DevicePort::new("DeviceBlock-3");
        port.core.zone = Some("Zone-1".to_string());
        port.save_switch_data(&switch());
        assert_eq!(port.data().switch_id(), Some("CXL-1"));
        assert_eq!(port.data().fabric_id(), Some("Acme-CXL-SW-SN-1-Zone-1"));
    }

    #[test]
    fn test_save_switch_data_partial() {
        let mut port = HostPort::new("ComputeBlock-1");
        port.save_switch_data(&switch());
        assert_eq!(port.data().switch_id(), Some("CXL-1"));
        assert!(port.data().fabric_id().is_none());

        let mut port = DevicePort::new("DeviceBlock-3");
        port.core.zone = Some("Zone-1".to_string());
        let mut partial = switch();
        partial.serial_number = None;
        port.save_switch_data(&partial);
        assert!(port.data().fabric_id().is_none());
    }
}
