//! Scripted transport and fixtures shared by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::transport::{HttpMethod, RemoteRequest, RemoteResponse, Transport, TransportError};

type Scripted = Result<RemoteResponse, TransportError>;

/// Connection settings every unit test runs against.
pub(crate) fn service_config() -> ServiceConfig {
    ServiceConfig {
        service_type: Some("http".to_string()),
        service_host: Some("localhost".to_string()),
        service_port: Some(5555),
        service_root: Some("/redfish/v1".to_string()),
        timeout: Some(3.0),
    }
}

pub(crate) fn odata(path: &str) -> Value {
    json!({ "@odata.id": path })
}

pub(crate) fn block_ref(id: &str) -> Value {
    odata(&format!("/redfish/v1/CompositionService/ResourceBlocks/{id}"))
}

/// `ComputeBlock-N` -> reference to `Systems/System-N`.
pub(crate) fn system_ref(host_id: &str) -> Value {
    odata(&format!(
        "/redfish/v1/{}",
        host_id.replace("ComputeBlock", "Systems/System")
    ))
}

pub(crate) fn members(paths: &[Value]) -> Value {
    json!({ "Members": paths })
}

/// Replays canned responses keyed by method and path, recording every request.
///
/// Unscripted paths answer 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<(HttpMethod, String), Scripted>>,
    requests: Mutex<Vec<RemoteRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replaces the route's response.
    pub(crate) fn set(&self, method: HttpMethod, path: &str, response: Scripted) {
        self.routes.lock().insert((method, path.to_string()), response);
    }

    pub(crate) fn respond(&self, path: &str, body: Value) {
        self.set(HttpMethod::Get, path, Ok(RemoteResponse::new(200, body.to_string())));
    }

    pub(crate) fn respond_status(&self, path: &str, status: u16, body: &str) {
        self.set(HttpMethod::Get, path, Ok(RemoteResponse::new(status, body)));
    }

    pub(crate) fn respond_patch(&self, path: &str, body: Value) {
        self.set(HttpMethod::Patch, path, Ok(RemoteResponse::new(200, body.to_string())));
    }

    pub(crate) fn fail(&self, path: &str, error: TransportError) {
        self.set(HttpMethod::Get, path, Err(error));
    }

    pub(crate) fn requests(&self) -> Vec<RemoteRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn count(&self, method: HttpMethod) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    /// Scripts resource blocks, switches and CPU/memory resources for a
    /// small fabric with no links.
    pub(crate) fn script_fabric(&self, hosts: &[&str], devices: &[&str], switches: &[&str]) {
        let blocks: Vec<Value> = hosts.iter().chain(devices).map(|id| block_ref(id)).collect();
        self.respond(
            "redfish/v1/CompositionService/ResourceBlocks",
            members(&blocks),
        );

        let switch_refs: Vec<Value> = switches
            .iter()
            .map(|id| odata(&format!("/redfish/v1/Fabrics/CXL/Switches/{id}")))
            .collect();
        self.respond("redfish/v1/Fabrics/CXL/Switches", members(&switch_refs));
        for id in switches {
            self.respond(
                &format!("redfish/v1/Fabrics/CXL/Switches/{id}"),
                json!({
                    "Id": id,
                    "Manufacturer": "Acme",
                    "Model": "CXL-SW",
                    "SerialNumber": format!("SN-{id}"),
                }),
            );
        }

        for host in hosts {
            self.script_host_links(host, &[]);
        }
        for device in devices {
            self.script_device_links(device, &[]);
        }
    }

    /// The host's system object lists itself plus `devices`.
    pub(crate) fn script_host_links(&self, host: &str, devices: &[&str]) {
        self.respond(&system_path(host), host_system(host, devices));
    }

    /// The device's resource block back-links `hosts`.
    pub(crate) fn script_device_links(&self, device: &str, hosts: &[&str]) {
        self.respond(&block_path(device), device_block(device, hosts));
    }
}

pub(crate) fn block_path(id: &str) -> String {
    format!("redfish/v1/CompositionService/ResourceBlocks/{id}")
}

pub(crate) fn system_path(host: &str) -> String {
    format!("redfish/v1/{}", host.replace("ComputeBlock", "Systems/System"))
}

fn host_system(host: &str, devices: &[&str]) -> Value {
    let refs: Vec<Value> = std::iter::once(&host)
        .chain(devices)
        .map(|id| block_ref(id))
        .collect();
    json!({ "Links": { "ResourceBlocks": refs } })
}

fn device_block(device: &str, hosts: &[&str]) -> Value {
    let suffix = device.rsplit('-').next().unwrap_or(device);
    let systems: Vec<Value> = hosts.iter().map(|h| system_ref(h)).collect();
    json!({
        "Id": device,
        "Memory": [odata(&format!("/redfish/v1/Chassis/Chassis-1/Memory/Memory-{suffix}"))],
        "Links": { "ComputerSystems": systems, "Zones": [] },
    })
}

fn path_of(url: &str) -> &str {
    url.split_once("://")
        .and_then(|(_, rest)| rest.split_once('/'))
        .map_or("", |(_, path)| path)
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError> {
        let key = (request.method, path_of(&request.url).to_string());
        self.requests.lock().push(request);

        let routes = self.routes.lock();
        match routes.get(&key) {
            Some(response) => response.clone(),
            None => Ok(RemoteResponse::new(
                404,
                json!({ "error": format!("{} not found", key.1) }).to_string(),
            )),
        }
    }
}
