//! Request bodies of the provider's mutating endpoints.
//!
//! Field names follow the provider exactly, including its inconsistent casing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{DiskSpec, HostingLocation, VirtualMachine};

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DiskPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) capacity: Option<u32>,
    #[serde(default)]
    pub(crate) storage_profile: String,
}

impl From<&DiskSpec> for DiskPayload {
    fn from(value: &DiskSpec) -> Self {
        Self {
            capacity: Some(value.capacity),
            storage_profile: value.storage_profile.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct HostingLocationPayload {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) default_network: String,
}

impl From<&HostingLocation> for HostingLocationPayload {
    fn from(value: &HostingLocation) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            default_network: value.default_network.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateVmPayload {
    #[serde(default)]
    pub(crate) client_id: u64,
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) template: Option<String>,
    #[serde(default)]
    pub(crate) guest_os_id: String,
    #[serde(default)]
    pub(crate) cores: u32,
    #[serde(default)]
    pub(crate) memory_size: u32,
    #[serde(default)]
    pub(crate) operating_system_disk: DiskPayload,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) additional_disks: Vec<DiskPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) iso_file: Option<String>,
    #[serde(default)]
    pub(crate) quote_item: BTreeMap<String, String>,
    #[serde(default)]
    pub(crate) hosting_location: HostingLocationPayload,
    #[serde(default)]
    pub(crate) backup_type: String,
}

impl From<&VirtualMachine> for CreateVmPayload {
    fn from(value: &VirtualMachine) -> Self {
        let os_capacity = if value.template.is_some() {
            None
        } else {
            value.operating_system_disk.capacity
        };
        Self {
            client_id: value.client_id,
            name: value.name.clone(),
            template: value.template.clone(),
            guest_os_id: value.guest_os_id.clone(),
            cores: value.cores,
            memory_size: value.memory_size,
            operating_system_disk: DiskPayload {
                capacity: os_capacity,
                storage_profile: value.operating_system_disk.storage_profile.clone(),
            },
            additional_disks: value.additional_disks.iter().map(DiskPayload::from).collect(),
            iso_file: value.iso_file.clone(),
            quote_item: value.quote_item.clone(),
            hosting_location: HostingLocationPayload::from(&value.hosting_location),
            backup_type: value.backup_type.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(crate) struct PowerOperationPayload {
    #[serde(rename = "VirtualResourceId")]
    pub(crate) virtual_resource_id: String,
    #[serde(rename = "Operation")]
    pub(crate) operation: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(crate) struct DeleteVmPayload {
    #[serde(rename = "VirtualResourceId")]
    pub(crate) virtual_resource_id: String,
    #[serde(rename = "CheckToken")]
    pub(crate) check_token: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddDiskPayload {
    pub(crate) virtual_resource_id: String,
    pub(crate) tier: String,
    pub(crate) size: u32,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(crate) struct CreateBucketPayload {
    #[serde(rename = "bucketName")]
    pub(crate) bucket_name: String,
    #[serde(rename = "enableObjectLock", default)]
    pub(crate) object_lock: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct ObjectStorageDetail {
    pub(crate) users: Vec<ObjectStorageUser>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct ObjectStorageUser {
    pub(crate) buckets: Vec<BucketEntry>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct BucketEntry {
    pub(crate) bucket_name: String,
}
