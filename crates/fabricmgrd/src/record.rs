//! Validated port and switch records.
//!
//! [`PortData`] and [`SwitchData`] are what the fabric manager reports to
//! its caller. Their setters enforce the record schema: hexadecimal fields
//! have a fixed width, capacity parts add up, and a port never carries
//! attributes of the other role. A setter that rejects a value returns a
//! [`RecordError`]; hydration turns that into an internal error tag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecordError;

/// Width in bytes of PCIe vendor and device identifiers.
pub const PCIE_ID_WIDTH: usize = 2;
/// Width in bytes of a packed PCI class code.
pub const CLASS_CODE_WIDTH: usize = 3;
/// Width in bytes of a PCIe device serial number.
pub const PCIE_SERIAL_WIDTH: usize = 8;

/// Switch port role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRole {
    /// Upstream, host-facing port.
    #[serde(rename = "USP")]
    Host,
    /// Downstream, device-facing port.
    #[serde(rename = "DSP")]
    Device,
}

impl PortRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortRole::Host => "USP",
            PortRole::Device => "DSP",
        }
    }
}

impl std::fmt::Display for PortRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of the device behind a downstream port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "CXL-Type1")]
    CxlType1,
    #[serde(rename = "CXL-Type2")]
    CxlType2,
    #[serde(rename = "CXL-Type3")]
    CxlType3,
    #[serde(rename = "CXL-Type3-MLD")]
    CxlType3Mld,
    #[serde(rename = "PCIe")]
    Pcie,
    Undetected,
    Other,
    Unknown,
}

/// Link training state machine state.
///
/// Reserved: the simulator exposes no link training state, so
/// [`PortData::ltssm_state`] is always serialized as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LtssmState {
    L0,
    L0s,
    L2,
    Detect,
    Polling,
    Configuration,
    Recovery,
    HotReset,
    Disable,
    Loopback,
}

/// PCI class code split into its three bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciClassCode {
    pub base: u8,
    pub sub: u8,
    pub prog: u8,
}

impl PciClassCode {
    /// Decodes a packed 3-byte class code such as `"0x060400"`.
    ///
    /// Anything but exactly six hex digits yields `None`.
    pub fn from_hex(value: &str) -> Option<Self> {
        let packed = decode_hex(value, CLASS_CODE_WIDTH)?;
        Some(Self {
            base: (packed >> 16) as u8,
            sub: ((packed >> 8) & 0xff) as u8,
            prog: (packed & 0xff) as u8,
        })
    }
}

/// Device capacity in bytes.
///
/// Always satisfies `total == volatile + persistent` with every part
/// non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capacity {
    volatile: i64,
    persistent: i64,
    total: i64,
}

impl Capacity {
    /// Builds a capacity from whichever parts are known.
    ///
    /// A lone volatile or persistent size implies the other part is zero.
    /// Any two parts determine the third. The result must be consistent.
    pub fn from_parts(
        volatile: Option<i64>,
        persistent: Option<i64>,
        total: Option<i64>,
    ) -> Result<Self, RecordError> {
        let inconsistent = || {
            RecordError::Capacity(format!(
                "volatile={volatile:?} persistent={persistent:?} total={total:?}"
            ))
        };

        let (volatile, persistent, total) = match (volatile, persistent, total) {
            (Some(v), None, None) => (v, 0, Some(v)),
            (None, Some(p), None) => (0, p, Some(p)),
            (Some(v), Some(p), None) => (v, p, v.checked_add(p)),
            (Some(v), None, Some(t)) => (v, t.checked_sub(v).ok_or_else(inconsistent)?, Some(t)),
            (None, Some(p), Some(t)) => (t.checked_sub(p).ok_or_else(inconsistent)?, p, Some(t)),
            (Some(v), Some(p), Some(t)) => (v, p, Some(t)),
            _ => return Err(inconsistent()),
        };
        let total = total.ok_or_else(inconsistent)?;

        if volatile < 0
            || persistent < 0
            || total < 0
            || volatile.checked_add(persistent) != Some(total)
        {
            return Err(inconsistent());
        }
        Ok(Self {
            volatile,
            persistent,
            total,
        })
    }

    pub fn volatile(&self) -> i64 {
        self.volatile
    }

    pub fn persistent(&self) -> i64 {
        self.persistent
    }

    pub fn total(&self) -> i64 {
        self.total
    }
}

/// Decodes a hex string of exactly `width` bytes, with optional `0x`.
pub fn decode_hex(value: &str, width: usize) -> Option<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if width == 0
        || width > 8
        || digits.len() != width * 2
        || !digits.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Normalizes a hex string of `width` bytes to lowercase, zero-padded form.
pub fn normalize_hex(value: &str, width: usize) -> Option<String> {
    decode_hex(value, width).map(|n| format!("{:0w$x}", n, w = width * 2))
}

fn is_normalized_hex(value: &str, width: usize) -> bool {
    value.len() == width * 2
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Reads an optional string field that must be a string when present.
///
/// JSON `null` counts as absent.
pub fn strict_string(
    field: &'static str,
    value: Option<&Value>,
) -> Result<Option<String>, RecordError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(RecordError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

/// Port information reported by the fabric manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortData {
    id: String,
    switch_id: Option<String>,
    /// Reserved; the simulator has no switch port numbering.
    switch_port_number: Option<String>,
    switch_port_type: PortRole,
    fabric_id: Option<String>,
    link: Option<Vec<String>>,
    device_type: Option<DeviceType>,
    #[serde(rename = "PCIClassCode")]
    pci_class_code: Option<PciClassCode>,
    #[serde(rename = "PCIeVendorId")]
    pcie_vendor_id: Option<String>,
    #[serde(rename = "PCIeDeviceId")]
    pcie_device_id: Option<String>,
    #[serde(rename = "PCIeDeviceSerialNumber")]
    pcie_device_serial_number: Option<String>,
    #[serde(rename = "CPUManufacturer")]
    cpu_manufacturer: Option<String>,
    #[serde(rename = "CPUModel")]
    cpu_model: Option<String>,
    #[serde(rename = "CPUSerialNumber")]
    cpu_serial_number: Option<String>,
    /// Reserved; see [`LtssmState`].
    #[serde(rename = "LTSSMState")]
    ltssm_state: Option<LtssmState>,
    device_keys: Map<String, Value>,
    /// Reserved; always serialized as an empty object.
    port_keys: Map<String, Value>,
    capacity: Option<Capacity>,
}

impl PortData {
    /// Creates an unhydrated record: every optional field unset.
    pub fn new(id: impl Into<String>, role: PortRole) -> Self {
        Self {
            id: id.into(),
            switch_id: None,
            switch_port_number: None,
            switch_port_type: role,
            fabric_id: None,
            link: None,
            device_type: None,
            pci_class_code: None,
            pcie_vendor_id: None,
            pcie_device_id: None,
            pcie_device_serial_number: None,
            cpu_manufacturer: None,
            cpu_model: None,
            cpu_serial_number: None,
            ltssm_state: None,
            device_keys: Map::new(),
            port_keys: Map::new(),
            capacity: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> PortRole {
        self.switch_port_type
    }

    pub fn switch_id(&self) -> Option<&str> {
        self.switch_id.as_deref()
    }

    /// Always `None`: reserved for fabrics that number switch ports.
    pub fn switch_port_number(&self) -> Option<&str> {
        self.switch_port_number.as_deref()
    }

    pub fn fabric_id(&self) -> Option<&str> {
        self.fabric_id.as_deref()
    }

    /// Linked port ids; `None` until links were resolved.
    pub fn link(&self) -> Option<&[String]> {
        self.link.as_deref()
    }

    pub fn device_type(&self) -> Option<DeviceType> {
        self.device_type
    }

    pub fn pci_class_code(&self) -> Option<PciClassCode> {
        self.pci_class_code
    }

    pub fn pcie_vendor_id(&self) -> Option<&str> {
        self.pcie_vendor_id.as_deref()
    }

    pub fn pcie_device_id(&self) -> Option<&str> {
        self.pcie_device_id.as_deref()
    }

    pub fn pcie_device_serial_number(&self) -> Option<&str> {
        self.pcie_device_serial_number.as_deref()
    }

    pub fn cpu_manufacturer(&self) -> Option<&str> {
        self.cpu_manufacturer.as_deref()
    }

    pub fn cpu_model(&self) -> Option<&str> {
        self.cpu_model.as_deref()
    }

    pub fn cpu_serial_number(&self) -> Option<&str> {
        self.cpu_serial_number.as_deref()
    }

    /// Always `None`: reserved for fabrics that report link training.
    pub fn ltssm_state(&self) -> Option<LtssmState> {
        self.ltssm_state
    }

    pub fn device_keys(&self) -> &Map<String, Value> {
        &self.device_keys
    }

    pub fn port_keys(&self) -> &Map<String, Value> {
        &self.port_keys
    }

    pub fn capacity(&self) -> Option<Capacity> {
        self.capacity
    }

    pub fn set_switch_id(&mut self, switch_id: impl Into<String>) {
        self.switch_id = Some(switch_id.into());
    }

    pub fn set_fabric_id(&mut self, fabric_id: impl Into<String>) {
        self.fabric_id = Some(fabric_id.into());
    }

    pub fn set_link(&mut self, link: Vec<String>) {
        self.link = Some(link);
    }

    pub fn set_device_type(&mut self, device_type: DeviceType) -> Result<(), RecordError> {
        self.device_only("deviceType")?;
        self.device_type = Some(device_type);
        Ok(())
    }

    pub fn set_pci_class_code(
        &mut self,
        class_code: Option<PciClassCode>,
    ) -> Result<(), RecordError> {
        if class_code.is_some() {
            self.device_only("PCIClassCode")?;
        }
        self.pci_class_code = class_code;
        Ok(())
    }

    pub fn set_pcie_vendor_id(&mut self, value: Option<String>) -> Result<(), RecordError> {
        self.pcie_vendor_id = self.pcie_field("PCIeVendorId", value, PCIE_ID_WIDTH)?;
        Ok(())
    }

    pub fn set_pcie_device_id(&mut self, value: Option<String>) -> Result<(), RecordError> {
        self.pcie_device_id = self.pcie_field("PCIeDeviceId", value, PCIE_ID_WIDTH)?;
        Ok(())
    }

    pub fn set_pcie_device_serial_number(
        &mut self,
        value: Option<String>,
    ) -> Result<(), RecordError> {
        self.pcie_device_serial_number =
            self.pcie_field("PCIeDeviceSerialNumber", value, PCIE_SERIAL_WIDTH)?;
        Ok(())
    }

    pub fn set_cpu_manufacturer(&mut self, value: Option<String>) -> Result<(), RecordError> {
        self.cpu_manufacturer = self.cpu_field("CPUManufacturer", value)?;
        Ok(())
    }

    pub fn set_cpu_model(&mut self, value: Option<String>) -> Result<(), RecordError> {
        self.cpu_model = self.cpu_field("CPUModel", value)?;
        Ok(())
    }

    pub fn set_cpu_serial_number(&mut self, value: Option<String>) -> Result<(), RecordError> {
        self.cpu_serial_number = self.cpu_field("CPUSerialNumber", value)?;
        Ok(())
    }

    pub fn set_device_keys(&mut self, keys: Map<String, Value>) -> Result<(), RecordError> {
        if !keys.is_empty() {
            self.device_only("deviceKeys")?;
        }
        self.device_keys = keys;
        Ok(())
    }

    pub fn set_capacity(&mut self, capacity: Capacity) -> Result<(), RecordError> {
        self.device_only("capacity")?;
        self.capacity = Some(capacity);
        Ok(())
    }

    /// Rejects device attributes on a host port.
    fn device_only(&self, field: &'static str) -> Result<(), RecordError> {
        if self.switch_port_type == PortRole::Host {
            return Err(RecordError::RoleMismatch {
                field,
                role: PortRole::Host.as_str(),
            });
        }
        Ok(())
    }

    fn pcie_field(
        &self,
        field: &'static str,
        value: Option<String>,
        width: usize,
    ) -> Result<Option<String>, RecordError> {
        let Some(value) = value else {
            return Ok(None);
        };
        self.device_only(field)?;
        if !is_normalized_hex(&value, width) {
            return Err(RecordError::InvalidField { field, value });
        }
        Ok(Some(value))
    }

    fn cpu_field(
        &self,
        field: &'static str,
        value: Option<String>,
    ) -> Result<Option<String>, RecordError> {
        if value.is_some() && self.switch_port_type == PortRole::Device {
            return Err(RecordError::RoleMismatch {
                field,
                role: PortRole::Device.as_str(),
            });
        }
        Ok(value)
    }
}

/// Switch information reported by the fabric manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchData {
    #[serde(rename = "switchId")]
    pub switch_id: String,
    #[serde(rename = "switchManufacturer")]
    pub manufacturer: Option<String>,
    #[serde(rename = "switchModel")]
    pub model: Option<String>,
    #[serde(rename = "switchSerialNumber")]
    pub serial_number: Option<String>,
    pub link: Option<Vec<String>>,
}

impl SwitchData {
    pub fn new(switch_id: impl Into<String>) -> Self {
        Self {
            switch_id: switch_id.into(),
            manufacturer: None,
            model: None,
            serial_number: None,
            link: None,
        }
    }
}
