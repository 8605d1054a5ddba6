//! Wire shapes of the provider's read paths.
//!
//! These mirror the JSON exactly and are converted into the domain types in
//! one place so numeric coercion never leaks past this module. The mock
//! provider serializes the same shapes.

use serde::{Deserialize, Serialize};

use super::{
    MoRef, NetworkDevice, NormalizationError, Specification, VirtualDisk, VmDetail, VmId,
    VmSummary, friendly_tier, normalize_capacity,
};

/// Identifier that the provider reports either as a JSON number or a string.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub(crate) enum WireId {
    Number(u64),
    Text(String),
}

impl From<WireId> for VmId {
    fn from(value: WireId) -> Self {
        match value {
            WireId::Number(number) => Self::new(number.to_string()),
            WireId::Text(text) => Self::new(text),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireVmSummary {
    pub(crate) id: WireId,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) hosting_location: Option<String>,
}

impl From<WireVmSummary> for VmSummary {
    fn from(value: WireVmSummary) -> Self {
        Self {
            id: value.id.into(),
            name: value.name,
            hosting_location: value.hosting_location.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct WireVirtualDisk {
    pub(crate) mo_ref: String,
    pub(crate) capacity: f64,
    pub(crate) vmfs: Option<String>,
    pub(crate) slot_info: Option<String>,
    pub(crate) tier: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) capacity_description: Option<String>,
}

impl TryFrom<WireVirtualDisk> for VirtualDisk {
    type Error = NormalizationError;

    fn try_from(value: WireVirtualDisk) -> Result<Self, Self::Error> {
        let tier = value.tier.unwrap_or_default();
        Ok(Self {
            mo_ref: MoRef::new(value.mo_ref),
            capacity: normalize_capacity(value.capacity)?,
            tier: friendly_tier(&tier).to_owned(),
            name: value.name.unwrap_or_default(),
            vmfs: value.vmfs.unwrap_or_default(),
            slot_info: value.slot_info.unwrap_or_default(),
            capacity_description: value.capacity_description.unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct WireNetworkDevice {
    pub(crate) name: Option<String>,
    pub(crate) mo_ref: Option<String>,
    pub(crate) network_name: Option<String>,
    pub(crate) mac_address: Option<String>,
    pub(crate) connected: bool,
    pub(crate) start_connected: bool,
    pub(crate) network_id: Option<String>,
}

impl From<WireNetworkDevice> for NetworkDevice {
    fn from(value: WireNetworkDevice) -> Self {
        Self {
            name: value.name.unwrap_or_default(),
            mo_ref: value.mo_ref.unwrap_or_default(),
            network_name: value.network_name.unwrap_or_default(),
            mac_address: value.mac_address.unwrap_or_default(),
            connected: value.connected,
            start_connected: value.start_connected,
            network_id: value.network_id.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct WireSpecification {
    pub(crate) health_state: Option<String>,
    pub(crate) power_state: Option<String>,
    pub(crate) cores: u32,
    pub(crate) sockets: u32,
    pub(crate) memory_gb: u32,
    pub(crate) mo_ref: Option<String>,
    pub(crate) virtual_disks: Option<Vec<WireVirtualDisk>>,
    pub(crate) network_devices: Option<Vec<WireNetworkDevice>>,
    pub(crate) hosting_location_id: Option<String>,
    pub(crate) backup_type: Option<String>,
}

impl TryFrom<WireSpecification> for Specification {
    type Error = NormalizationError;

    fn try_from(value: WireSpecification) -> Result<Self, Self::Error> {
        let virtual_disks = value
            .virtual_disks
            .unwrap_or_default()
            .into_iter()
            .map(VirtualDisk::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            health_state: value.health_state.unwrap_or_default(),
            power_state: value.power_state.unwrap_or_default(),
            cores: value.cores,
            sockets: value.sockets,
            memory_gb: value.memory_gb,
            mo_ref: MoRef::new(value.mo_ref.unwrap_or_default()),
            virtual_disks,
            network_devices: value
                .network_devices
                .unwrap_or_default()
                .into_iter()
                .map(NetworkDevice::from)
                .collect(),
            hosting_location_id: value.hosting_location_id.unwrap_or_default(),
            backup_type: value.backup_type.unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireVmDetail {
    pub(crate) id: WireId,
    #[serde(default)]
    pub(crate) client_id: u64,
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default, rename = "guestOS")]
    pub(crate) guest_os: Option<String>,
    #[serde(default)]
    pub(crate) hosting_location: Option<String>,
    #[serde(default, rename = "mountedISO")]
    pub(crate) mounted_iso: Option<String>,
    #[serde(default)]
    pub(crate) specification: WireSpecification,
}

impl TryFrom<WireVmDetail> for VmDetail {
    type Error = NormalizationError;

    fn try_from(value: WireVmDetail) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            client_id: value.client_id,
            name: value.name,
            guest_os: value.guest_os,
            hosting_location: value.hosting_location.unwrap_or_default(),
            mounted_iso: value.mounted_iso,
            specification: Specification::try_from(value.specification)?,
        })
    }
}
