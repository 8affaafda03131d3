//! Schema path and field name constants for the reference simulator

/// Resource block collection, relative to the service root
pub const RESOURCE_BLOCKS_PATH: &str = "CompositionService/ResourceBlocks";

/// CXL switch collection, relative to the service root
pub const SWITCHES_PATH: &str = "Fabrics/CXL/Switches";

/// PCIe device collection, relative to the service root
pub const PCIE_DEVICES_PATH: &str = "Chassis/Chassis-1/PCIeDevices";

/// Name prefix of a PCIe device entry
pub const PCIE_DEVICE_PREFIX: &str = "PCIe-";

/// Name prefix of a PCIe function entry
pub const PCIE_FUNCTION_PREFIX: &str = "PCIeF-";

/// Resource block name prefix used by host (USP) ports
pub const HOST_BLOCK_PREFIX: &str = "ComputeBlock";

/// Computer system path prefix that replaces [`HOST_BLOCK_PREFIX`]
pub const SYSTEM_PATH_PREFIX: &str = "Systems/System";

/// Device collections a device-side resource block may reference
pub const DEVICE_COLLECTIONS: [&str; 4] = [
    fields::PROCESSORS,
    fields::MEMORY,
    fields::ETHERNET_INTERFACES,
    fields::DRIVES,
];

/// Field names used in simulator resources
pub mod fields {
    pub const ODATA_ID: &str = "@odata.id";
    pub const MEMBERS: &str = "Members";
    pub const LINKS: &str = "Links";

    // Link collections
    pub const ZONES: &str = "Zones";
    pub const RESOURCE_BLOCKS: &str = "ResourceBlocks";
    pub const COMPUTER_SYSTEMS: &str = "ComputerSystems";

    // Device collections
    pub const PROCESSORS: &str = "Processors";
    pub const MEMORY: &str = "Memory";
    pub const ETHERNET_INTERFACES: &str = "EthernetInterfaces";
    pub const DRIVES: &str = "Drives";

    // Identity
    pub const MANUFACTURER: &str = "Manufacturer";
    pub const MODEL: &str = "Model";
    pub const SERIAL_NUMBER: &str = "SerialNumber";
    pub const PROCESSOR_TYPE: &str = "ProcessorType";

    // PCIe
    pub const PCIE_FUNCTIONS: &str = "PCIeFunctions";
    pub const DEVICE_ID: &str = "DeviceId";
    pub const VENDOR_ID: &str = "VendorId";
    pub const CLASS_CODE: &str = "ClassCode";

    // CXL memory
    pub const CXL: &str = "CXL";
    pub const STAGED_VOLATILE_SIZE_MIB: &str = "StagedVolatileSizeMiB";
    pub const STAGED_NON_VOLATILE_SIZE_MIB: &str = "StagedNonVolatileSizeMiB";
}

/// `ProcessorType` value identifying a host CPU
pub const PROCESSOR_TYPE_CPU: &str = "CPU";

/// Device key under which a memory device's serial number is reported
pub const SIMULATED_DEVICE_ID_KEY: &str = "SimulatedDeviceID";
