//! Simulated CXL fabric for end-to-end tests
//!
//! [`SimulatedFabric`] plays the reference simulator behind the
//! [`Transport`] seam. It serves resource blocks, computer systems,
//! switches, processors, PCIe devices and CXL memory, and accepts PATCH on
//! a computer system's resource block list. A PATCH updates both sides of
//! the link: the system's block list and the device blocks' computer
//! system back-links.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use cxl_fabricmgrd::{
    FabricController, HttpMethod, RemoteRequest, RemoteResponse, ServiceConfig, Transport,
    TransportError,
};

/// Service root served by the simulated fabric
pub const SERVICE_ROOT: &str = "/redfish/v1";

/// Zone every resource block belongs to unless the builder says otherwise
pub const DEFAULT_ZONE: &str = "Zone-1";

/// Connection settings pointing at a simulated fabric
pub fn service_config() -> ServiceConfig {
    ServiceConfig {
        service_type: Some("http".to_string()),
        service_host: Some("simulator".to_string()),
        service_port: Some(5555),
        service_root: Some(SERVICE_ROOT.to_string()),
        timeout: Some(1.0),
    }
}

/// Numeric suffix shared by a block and the resources behind it
fn suffix(id: &str) -> &str {
    id.rsplit('-').next().unwrap_or(id)
}

fn odata(path: impl AsRef<str>) -> Value {
    json!({ "@odata.id": format!("{}/{}", SERVICE_ROOT, path.as_ref()) })
}

/// Host (compute) resource block
#[derive(Debug, Clone)]
pub struct HostFixture {
    pub id: String,
    pub cpu_manufacturer: String,
    pub cpu_model: String,
    pub cpu_serial: String,
}

impl HostFixture {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            cpu_serial: format!("CPU-SN-{}", suffix(&id)),
            cpu_manufacturer: "Intel".to_string(),
            cpu_model: "Xeon".to_string(),
            id,
        }
    }

    fn system_id(&self) -> String {
        format!("System-{}", suffix(&self.id))
    }
}

/// What sits behind a device resource block
#[derive(Debug, Clone)]
pub enum DeviceKind {
    /// CXL type 3 memory with staged sizes in MiB
    Memory {
        serial: String,
        volatile_mib: i64,
        persistent_mib: i64,
    },
    /// PCIe endpoint
    Pcie {
        serial: String,
        vendor_id: String,
        device_id: String,
        class_code: String,
    },
}

/// Device resource block
#[derive(Debug, Clone)]
pub struct DeviceFixture {
    pub id: String,
    pub kind: DeviceKind,
}

impl DeviceFixture {
    fn collection(&self) -> &'static str {
        match self.kind {
            DeviceKind::Memory { .. } => "Memory",
            DeviceKind::Pcie { .. } => "EthernetInterfaces",
        }
    }

    fn device_path(&self) -> String {
        let n = suffix(&self.id);
        match self.kind {
            DeviceKind::Memory { .. } => format!("Chassis/Chassis-1/Memory/Memory-{n}"),
            DeviceKind::Pcie { .. } => format!("Chassis/Chassis-1/NetworkAdapters/NIC-{n}"),
        }
    }
}

/// CXL switch
#[derive(Debug, Clone)]
pub struct SwitchFixture {
    pub id: String,
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
}

/// Builder for [`SimulatedFabric`]
#[derive(Debug, Default)]
pub struct FabricBuilder {
    hosts: Vec<HostFixture>,
    devices: Vec<DeviceFixture>,
    switches: Vec<SwitchFixture>,
    zone: Option<String>,
    links: Vec<(String, String)>,
}

impl FabricBuilder {
    pub fn host(mut self, id: impl Into<String>) -> Self {
        self.hosts.push(HostFixture::new(id));
        self
    }

    pub fn memory_device(
        mut self,
        id: impl Into<String>,
        volatile_mib: i64,
        persistent_mib: i64,
    ) -> Self {
        let id = id.into();
        self.devices.push(DeviceFixture {
            kind: DeviceKind::Memory {
                serial: format!("MEM-SN-{}", suffix(&id)),
                volatile_mib,
                persistent_mib,
            },
            id,
        });
        self
    }

    pub fn pcie_device(
        mut self,
        id: impl Into<String>,
        serial: impl Into<String>,
        vendor_id: impl Into<String>,
        device_id: impl Into<String>,
        class_code: impl Into<String>,
    ) -> Self {
        self.devices.push(DeviceFixture {
            id: id.into(),
            kind: DeviceKind::Pcie {
                serial: serial.into(),
                vendor_id: vendor_id.into(),
                device_id: device_id.into(),
                class_code: class_code.into(),
            },
        });
        self
    }

    pub fn switch(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.switches.push(SwitchFixture {
            manufacturer: "Acme".to_string(),
            model: "CXL-SW".to_string(),
            serial: format!("SN-{id}"),
            id,
        });
        self
    }

    /// Zone of every resource block; `None` leaves blocks without a zone.
    pub fn zone(mut self, zone: Option<&str>) -> Self {
        self.zone = zone.map(str::to_string);
        self
    }

    pub fn link(mut self, host: impl Into<String>, device: impl Into<String>) -> Self {
        self.links.push((host.into(), device.into()));
        self
    }

    pub fn build(self) -> Arc<SimulatedFabric> {
        let mut links: BTreeMap<String, Vec<String>> = self
            .hosts
            .iter()
            .map(|h| (h.id.clone(), Vec::new()))
            .collect();
        for (host, device) in self.links {
            links.entry(host).or_default().push(device);
        }

        Arc::new(SimulatedFabric {
            state: Mutex::new(FabricState {
                hosts: self.hosts,
                devices: self.devices,
                switches: self.switches,
                zone: self.zone,
                links,
                faults: HashMap::new(),
                requests: Vec::new(),
            }),
        })
    }
}

/// Standard fabric: two hosts, a 2+1 MiB memory device, a PCIe device and
/// one switch, no links
pub fn standard_fabric() -> Arc<SimulatedFabric> {
    SimulatedFabric::builder()
        .host("ComputeBlock-1")
        .host("ComputeBlock-2")
        .memory_device("DeviceBlock-3", 2, 1)
        .pcie_device("DeviceBlock-4", "0x0123456789ABCDEF", "1AF4", "0x1000", "0x020000")
        .switch("CXL-1")
        .build()
}

#[derive(Debug)]
struct FabricState {
    hosts: Vec<HostFixture>,
    devices: Vec<DeviceFixture>,
    switches: Vec<SwitchFixture>,
    zone: Option<String>,
    /// host block id -> linked device block ids, in system list order
    links: BTreeMap<String, Vec<String>>,
    faults: HashMap<(HttpMethod, String), u16>,
    requests: Vec<RemoteRequest>,
}

impl FabricState {
    fn host(&self, id: &str) -> Option<&HostFixture> {
        self.hosts.iter().find(|h| h.id == id)
    }

    fn host_by_suffix(&self, n: &str) -> Option<&HostFixture> {
        self.hosts.iter().find(|h| suffix(&h.id) == n)
    }

    fn device(&self, id: &str) -> Option<&DeviceFixture> {
        self.devices.iter().find(|d| d.id == id)
    }

    fn device_by_suffix(&self, n: &str) -> Option<&DeviceFixture> {
        self.devices.iter().find(|d| suffix(&d.id) == n)
    }

    fn is_block(&self, id: &str) -> bool {
        self.host(id).is_some() || self.device(id).is_some()
    }

    fn hosts_of(&self, device: &str) -> Vec<&HostFixture> {
        self.hosts
            .iter()
            .filter(|h| {
                self.links
                    .get(&h.id)
                    .is_some_and(|devices| devices.iter().any(|d| d == device))
            })
            .collect()
    }

    fn zones(&self) -> Vec<Value> {
        self.zone
            .iter()
            .map(|z| odata(format!("CompositionService/ResourceZones/{z}")))
            .collect()
    }

    fn get(&self, path: &str) -> Option<Value> {
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["CompositionService", "ResourceBlocks"] => {
                let members: Vec<Value> = self
                    .hosts
                    .iter()
                    .map(|h| &h.id)
                    .chain(self.devices.iter().map(|d| &d.id))
                    .map(|id| odata(format!("CompositionService/ResourceBlocks/{id}")))
                    .collect();
                Some(json!({ "Members": members }))
            }
            ["CompositionService", "ResourceBlocks", id] => self.block(id),
            ["Systems", system] => {
                let host = self.host_by_suffix(suffix(system))?;
                let mut blocks = vec![odata(format!(
                    "CompositionService/ResourceBlocks/{}",
                    host.id
                ))];
                for device in self.links.get(&host.id).into_iter().flatten() {
                    blocks.push(odata(format!("CompositionService/ResourceBlocks/{device}")));
                }
                Some(json!({ "Id": system, "Links": { "ResourceBlocks": blocks } }))
            }
            ["Systems", system, "Processors", "CPU-1"] => {
                let host = self.host_by_suffix(suffix(system))?;
                Some(json!({
                    "Id": "CPU-1",
                    "ProcessorType": "CPU",
                    "Manufacturer": host.cpu_manufacturer,
                    "Model": host.cpu_model,
                    "SerialNumber": host.cpu_serial,
                }))
            }
            ["Fabrics", "CXL", "Switches"] => {
                let members: Vec<Value> = self
                    .switches
                    .iter()
                    .map(|s| odata(format!("Fabrics/CXL/Switches/{}", s.id)))
                    .collect();
                Some(json!({ "Members": members }))
            }
            ["Fabrics", "CXL", "Switches", id] => {
                let switch = self.switches.iter().find(|s| s.id == *id)?;
                Some(json!({
                    "Id": switch.id,
                    "Manufacturer": switch.manufacturer,
                    "Model": switch.model,
                    "SerialNumber": switch.serial,
                }))
            }
            ["Chassis", "Chassis-1", "PCIeDevices", pcie] => {
                let n = pcie.strip_prefix("PCIe-")?;
                let device = self.device_by_suffix(n)?;
                match &device.kind {
                    DeviceKind::Pcie { serial, .. } => {
                        let functions =
                            format!("Chassis/Chassis-1/PCIeDevices/{pcie}/PCIeFunctions");
                        Some(json!({
                            "Id": pcie,
                            "SerialNumber": serial,
                            "PCIeFunctions": odata(functions),
                        }))
                    }
                    DeviceKind::Memory { .. } => Some(json!({ "Id": pcie })),
                }
            }
            ["Chassis", "Chassis-1", "PCIeDevices", _, "PCIeFunctions", function] => {
                let n = function.strip_prefix("PCIeF-")?;
                match &self.device_by_suffix(n)?.kind {
                    DeviceKind::Pcie {
                        vendor_id,
                        device_id,
                        class_code,
                        ..
                    } => Some(json!({
                        "Id": function,
                        "VendorId": vendor_id,
                        "DeviceId": device_id,
                        "ClassCode": class_code,
                    })),
                    DeviceKind::Memory { .. } => None,
                }
            }
            ["Chassis", "Chassis-1", "Memory", memory] => {
                match &self.device_by_suffix(suffix(memory))?.kind {
                    DeviceKind::Memory {
                        serial,
                        volatile_mib,
                        persistent_mib,
                    } => Some(json!({
                        "Id": memory,
                        "SerialNumber": serial,
                        "CXL": {
                            "StagedVolatileSizeMiB": volatile_mib,
                            "StagedNonVolatileSizeMiB": persistent_mib,
                        },
                    })),
                    DeviceKind::Pcie { .. } => None,
                }
            }
            _ => None,
        }
    }

    fn block(&self, id: &str) -> Option<Value> {
        if let Some(host) = self.host(id) {
            return Some(json!({
                "Id": host.id,
                "Processors": [odata(format!("Systems/{}/Processors/CPU-1", host.system_id()))],
                "Links": {
                    "Zones": self.zones(),
                    "ComputerSystems": [odata(format!("Systems/{}", host.system_id()))],
                },
            }));
        }

        let device = self.device(id)?;
        let systems: Vec<Value> = self
            .hosts_of(id)
            .iter()
            .map(|h| odata(format!("Systems/{}", h.system_id())))
            .collect();
        let mut block = json!({
            "Id": device.id,
            "Links": { "Zones": self.zones(), "ComputerSystems": systems },
        });
        block[device.collection()] = json!([odata(device.device_path())]);
        Some(block)
    }

    /// Applies a PATCH of a system's resource block list.
    fn patch(&mut self, path: &str, body: Option<&str>) -> RemoteResponse {
        let Some(system) = path.strip_prefix("Systems/") else {
            return RemoteResponse::new(405, r#"{"error":"method not allowed"}"#);
        };
        let Some(host) = self.host_by_suffix(suffix(system)).map(|h| h.id.clone()) else {
            return RemoteResponse::new(404, r#"{"error":"not found"}"#);
        };
        let Some(body) = body.and_then(|b| serde_json::from_str::<Value>(b).ok()) else {
            return RemoteResponse::new(400, r#"{"error":"bad request"}"#);
        };

        let mut devices = Vec::new();
        for block in body["Links"]["ResourceBlocks"].as_array().into_iter().flatten() {
            let Some(id) = block["@odata.id"].as_str().and_then(|p| p.rsplit('/').next()) else {
                return RemoteResponse::new(400, r#"{"error":"bad reference"}"#);
            };
            if !self.is_block(id) {
                return RemoteResponse::new(400, r#"{"error":"unknown resource block"}"#);
            }
            if self.device(id).is_some() {
                devices.push(id.to_string());
            }
        }

        debug!(host = %host, devices = ?devices, "simulated fabric: links replaced");
        self.links.insert(host, devices);
        RemoteResponse::new(200, "{}")
    }
}

/// In-memory fabric simulator implementing [`Transport`]
#[derive(Debug)]
pub struct SimulatedFabric {
    state: Mutex<FabricState>,
}

impl SimulatedFabric {
    pub fn builder() -> FabricBuilder {
        FabricBuilder {
            zone: Some(DEFAULT_ZONE.to_string()),
            ..FabricBuilder::default()
        }
    }

    /// Controller talking to this fabric
    pub fn controller(self: &Arc<Self>) -> FabricController {
        FabricController::with_transport(service_config(), self.clone())
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of PATCH requests received, accepted or not
    pub fn patch_count(&self) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == HttpMethod::Patch)
            .count()
    }

    /// Devices linked to `host`, as listed by its system
    pub fn links_of(&self, host: &str) -> Vec<String> {
        self.state.lock().links.get(host).cloned().unwrap_or_default()
    }

    /// Hosts whose system lists `device`
    pub fn hosts_of(&self, device: &str) -> Vec<String> {
        let state = self.state.lock();
        let hosts = state.hosts_of(device).iter().map(|h| h.id.clone()).collect();
        hosts
    }

    /// Links `device` to `host` behind the fabric manager's back
    pub fn force_link(&self, host: &str, device: &str) {
        self.state
            .lock()
            .links
            .entry(host.to_string())
            .or_default()
            .push(device.to_string());
    }

    /// Makes `method` on `path` (relative to the service root) answer `status`
    pub fn inject_status(&self, method: HttpMethod, path: &str, status: u16) {
        self.state
            .lock()
            .faults
            .insert((method, path.trim_start_matches('/').to_string()), status);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    fn relative_path(url: &str) -> Option<String> {
        let path = url
            .split_once("://")
            .and_then(|(_, rest)| rest.split_once('/'))
            .map_or("", |(_, path)| path);
        let root = SERVICE_ROOT.trim_start_matches('/');
        path.strip_prefix(root)
            .map(|rest| rest.trim_start_matches('/').to_string())
    }
}

#[async_trait]
impl Transport for SimulatedFabric {
    async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError> {
        // Lets concurrent operations interleave between round trips.
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        state.requests.push(request.clone());

        let Some(path) = Self::relative_path(&request.url) else {
            return Ok(RemoteResponse::new(404, r#"{"error":"not found"}"#));
        };
        if let Some(status) = state.faults.get(&(request.method, path.clone())) {
            return Ok(RemoteResponse::new(*status, r#"{"error":"injected"}"#));
        }

        let response = match request.method {
            HttpMethod::Get => match state.get(&path) {
                Some(value) => RemoteResponse::new(200, value.to_string()),
                None => RemoteResponse::new(404, r#"{"error":"not found"}"#),
            },
            HttpMethod::Patch => state.patch(&path, request.body.as_deref()),
        };
        Ok(response)
    }
}
