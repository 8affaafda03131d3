//! SwitchRecord - one CXL switch.

use tracing::{debug, warn};

use crate::accumulator::ErrorKind;
use crate::paths::{fields, SWITCHES_PATH};
use crate::record::{strict_string, SwitchData};
use crate::remote::RemoteClient;

/// Hydrates a [`SwitchData`] from the simulator.
#[derive(Debug, Clone)]
pub struct SwitchRecord {
    data: SwitchData,
}

impl SwitchRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            data: SwitchData::new(id),
        }
    }

    pub fn id(&self) -> &str {
        &self.data.switch_id
    }

    pub fn data(&self) -> &SwitchData {
        &self.data
    }

    pub fn into_data(self) -> SwitchData {
        self.data
    }

    /// Copies manufacturer, model and serial number from the switch resource.
    ///
    /// A failed lookup leaves all three unset. A present but non-string
    /// value records an internal error; the other fields are still copied.
    pub async fn hydrate(&mut self, remote: &mut RemoteClient) {
        debug!(switch = %self.id(), "entry: hydrate switch");
        let path = format!("{}/{}", SWITCHES_PATH, self.id());
        let Some(switch) = remote.get(&path, true).await else {
            return;
        };

        let mut read = |field: &'static str| match strict_string(field, switch.get(field)) {
            Ok(value) => value,
            Err(e) => {
                warn!(switch = %switch, error = %e, "Validation error");
                remote.record(ErrorKind::Internal);
                None
            }
        };
        let manufacturer = read(fields::MANUFACTURER);
        let model = read(fields::MODEL);
        let serial_number = read(fields::SERIAL_NUMBER);

        self.data.manufacturer = manufacturer;
        self.data.model = model;
        self.data.serial_number = serial_number;
    }

    /// Links this switch to every other known switch.
    ///
    /// Switches are assumed to form a complete graph, whatever fabric they
    /// belong to.
    pub fn set_links(&mut self, switch_ids: &[String]) {
        let link: Vec<String> = switch_ids
            .iter()
            .filter(|id| id.as_str() != self.id())
            .cloned()
            .collect();
        self.data.link = Some(link);
    }
}
