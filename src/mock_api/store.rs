//! In-memory state of the mock provider.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::StatusCode;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::api::payload::{BucketEntry, CreateVmPayload, ObjectStorageDetail, ObjectStorageUser};
use crate::model::backend_tier;
use crate::model::wire::{
    WireId, WireNetworkDevice, WireSpecification, WireVirtualDisk, WireVmDetail, WireVmSummary,
};

const FIRST_VM_ID: u64 = 12345;
const TEMPLATE_DISK_CAPACITY: u32 = 40;
const POWERED_ON: &str = "PoweredOn";
const POWERED_OFF: &str = "PoweredOff";

/// Credentials and visibility delays of a mock provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MockSettings {
    /// Bearer credential every request must carry.
    pub api_key: String,
    /// Caller identity every request must carry in `x-mcs-user`.
    pub user_email: String,
    /// Listing calls for which a newly created machine stays hidden.
    pub listing_delay: u32,
    /// Detail reads for which a newly added disk stays hidden.
    pub disk_delay: u32,
}

impl MockSettings {
    /// Settings with the given credentials and no visibility delays.
    #[must_use]
    pub fn new(api_key: impl Into<String>, user_email: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            user_email: user_email.into(),
            listing_delay: 0,
            disk_delay: 0,
        }
    }

    /// Hides new machines from this many listing calls.
    #[must_use]
    pub const fn with_listing_delay(mut self, listings: u32) -> Self {
        self.listing_delay = listings;
        self
    }

    /// Hides new disks from this many detail reads.
    #[must_use]
    pub const fn with_disk_delay(mut self, reads: u32) -> Self {
        self.disk_delay = reads;
        self
    }
}

/// Rejections returned by the mock provider.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MockError {
    /// A create or add-disk request lacked a required value.
    #[error("Missing required fields")]
    MissingFields,
    /// The addressed machine does not exist.
    #[error("virtual machine {0} not found")]
    VmNotFound(String),
    /// The delete check token differs from the machine's moRef.
    #[error("check token does not match virtual machine {0}")]
    CheckTokenMismatch(String),
    /// Delete was requested while the machine is still running.
    #[error("virtual machine {0} must be powered off before deletion")]
    NotPoweredOff(String),
    /// The bucket already exists for the tenant.
    #[error("bucket {0} already exists")]
    BucketExists(String),
    /// The bucket does not exist for the tenant and user.
    #[error("bucket {0} not found")]
    BucketNotFound(String),
}

impl MockError {
    /// HTTP status reported for this rejection.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields => StatusCode::BAD_REQUEST,
            Self::VmNotFound(_) | Self::BucketNotFound(_) => StatusCode::NOT_FOUND,
            Self::CheckTokenMismatch(_) | Self::NotPoweredOff(_) | Self::BucketExists(_) => {
                StatusCode::CONFLICT
            }
        }
    }
}

#[derive(Clone, Debug)]
struct MockDisk {
    mo_ref: String,
    capacity: u32,
    tier: String,
    name: String,
    hidden_reads: u32,
}

#[derive(Clone, Debug)]
struct MockVm {
    client_id: u64,
    name: String,
    guest_os_id: String,
    cores: u32,
    memory_size: u32,
    hosting_location_id: String,
    hosting_location_name: String,
    default_network: String,
    backup_type: String,
    iso_file: Option<String>,
    mo_ref: String,
    power_state: String,
    disks: Vec<MockDisk>,
    hidden_listings: u32,
}

impl MockVm {
    fn next_disk_name(&self) -> String {
        format!("Hard disk {}", self.disks.len().saturating_add(1))
    }

    fn push_disk(&mut self, capacity: u32, storage_profile: &str, hidden_reads: u32) -> String {
        let mo_ref = Uuid::new_v4().to_string();
        let name = self.next_disk_name();
        self.disks.push(MockDisk {
            mo_ref: mo_ref.clone(),
            capacity,
            tier: backend_tier(storage_profile).to_owned(),
            name,
            hidden_reads,
        });
        mo_ref
    }
}

#[derive(Debug)]
struct StoreState {
    next_id: u64,
    vms: BTreeMap<u64, MockVm>,
    buckets: BTreeMap<u64, BTreeMap<String, Vec<String>>>,
    listing_calls: u32,
    detail_calls: u32,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            next_id: FIRST_VM_ID,
            vms: BTreeMap::new(),
            buckets: BTreeMap::new(),
            listing_calls: 0,
            detail_calls: 0,
        }
    }
}

/// Cloneable handle over the mock provider's state.
#[derive(Clone, Debug)]
pub struct MockStore {
    settings: Arc<MockSettings>,
    state: Arc<Mutex<StoreState>>,
}

fn missing_if(blank: bool) -> Result<(), MockError> {
    if blank {
        return Err(MockError::MissingFields);
    }
    Ok(())
}

fn parse_vm_id(raw: &str) -> Result<u64, MockError> {
    raw.trim()
        .parse()
        .map_err(|_| MockError::VmNotFound(raw.to_owned()))
}

fn validate_create(payload: &CreateVmPayload) -> Result<(), MockError> {
    let disk = &payload.operating_system_disk;
    let location = &payload.hosting_location;
    missing_if(
        payload.client_id == 0
            || payload.name.trim().is_empty()
            || payload.guest_os_id.trim().is_empty()
            || payload.cores == 0
            || payload.memory_size == 0
            || disk.storage_profile.trim().is_empty()
            || location.id.trim().is_empty()
            || location.name.trim().is_empty()
            || location.default_network.trim().is_empty()
            || payload.backup_type.trim().is_empty(),
    )?;
    let has_template = payload
        .template
        .as_deref()
        .is_some_and(|template| !template.trim().is_empty());
    let has_capacity = disk.capacity.is_some_and(|capacity| capacity > 0);
    missing_if(has_template == has_capacity)?;
    missing_if(
        payload
            .additional_disks
            .iter()
            .any(|extra| extra.capacity.is_none_or(|capacity| capacity == 0)),
    )
}

impl MockStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(settings: MockSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    /// Returns the store settings.
    #[must_use]
    pub fn settings(&self) -> &MockSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of listing calls served so far.
    #[must_use]
    pub fn listing_calls(&self) -> u32 {
        self.lock().listing_calls
    }

    /// Number of detail reads served so far.
    #[must_use]
    pub fn detail_calls(&self) -> u32 {
        self.lock().detail_calls
    }

    /// Number of machines currently held.
    #[must_use]
    pub fn vm_count(&self) -> usize {
        self.lock().vms.len()
    }

    /// Returns `true` when the request carries the expected credentials.
    #[must_use]
    pub fn authorizes(&self, authorization: Option<&str>, caller: Option<&str>) -> bool {
        let expected = format!("Bearer {}", self.settings.api_key);
        authorization == Some(expected.as_str()) && caller == Some(self.settings.user_email.as_str())
    }

    /// Returns the moRef of a machine, if it exists.
    #[must_use]
    pub fn mo_ref_of(&self, vm_id: u64) -> Option<String> {
        self.lock().vms.get(&vm_id).map(|vm| vm.mo_ref.clone())
    }

    pub(crate) fn create_vm(&self, payload: &CreateVmPayload) -> Result<u64, MockError> {
        validate_create(payload)?;
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id = id.saturating_add(1);

        let mut vm = MockVm {
            client_id: payload.client_id,
            name: payload.name.trim().to_owned(),
            guest_os_id: payload.guest_os_id.clone(),
            cores: payload.cores,
            memory_size: payload.memory_size,
            hosting_location_id: payload.hosting_location.id.clone(),
            hosting_location_name: payload.hosting_location.name.clone(),
            default_network: payload.hosting_location.default_network.clone(),
            backup_type: payload.backup_type.clone(),
            iso_file: payload.iso_file.clone(),
            mo_ref: format!("vm-{id}"),
            power_state: POWERED_ON.to_owned(),
            disks: Vec::new(),
            hidden_listings: self.settings.listing_delay,
        };
        let os_disk = &payload.operating_system_disk;
        vm.push_disk(
            os_disk.capacity.unwrap_or(TEMPLATE_DISK_CAPACITY),
            &os_disk.storage_profile,
            0,
        );
        for extra in &payload.additional_disks {
            vm.push_disk(extra.capacity.unwrap_or_default(), &extra.storage_profile, 0);
        }

        info!(vm_id = id, name = %vm.name, "mock machine created");
        state.vms.insert(id, vm);
        Ok(id)
    }

    pub(crate) fn list_vms(&self, client_id: u64) -> Vec<WireVmSummary> {
        let mut state = self.lock();
        state.listing_calls = state.listing_calls.saturating_add(1);
        let mut visible = Vec::new();
        for (id, vm) in state.vms.iter_mut().filter(|(_, vm)| vm.client_id == client_id) {
            if vm.hidden_listings > 0 {
                vm.hidden_listings -= 1;
                continue;
            }
            visible.push(WireVmSummary {
                id: WireId::Number(*id),
                name: vm.name.clone(),
                hosting_location: Some(vm.hosting_location_name.clone()),
            });
        }
        visible
    }

    pub(crate) fn vm_detail(&self, raw_id: &str) -> Result<WireVmDetail, MockError> {
        let id = parse_vm_id(raw_id)?;
        let mut state = self.lock();
        state.detail_calls = state.detail_calls.saturating_add(1);
        let vm = state
            .vms
            .get_mut(&id)
            .ok_or_else(|| MockError::VmNotFound(raw_id.to_owned()))?;

        let mut disks = Vec::new();
        for disk in &mut vm.disks {
            if disk.hidden_reads > 0 {
                disk.hidden_reads -= 1;
                continue;
            }
            disks.push(WireVirtualDisk {
                mo_ref: disk.mo_ref.clone(),
                capacity: f64::from(disk.capacity),
                vmfs: Some(format!("{}-datastore", vm.hosting_location_id)),
                slot_info: None,
                tier: Some(disk.tier.clone()),
                name: Some(disk.name.clone()),
                capacity_description: Some(format!("{} GB", disk.capacity)),
            });
        }

        Ok(WireVmDetail {
            id: WireId::Number(id),
            client_id: vm.client_id,
            name: vm.name.clone(),
            guest_os: Some(vm.guest_os_id.clone()),
            hosting_location: Some(vm.hosting_location_name.clone()),
            mounted_iso: vm.iso_file.clone(),
            specification: WireSpecification {
                health_state: Some("Normal".to_owned()),
                power_state: Some(vm.power_state.clone()),
                cores: vm.cores,
                sockets: 1,
                memory_gb: vm.memory_size,
                mo_ref: Some(vm.mo_ref.clone()),
                virtual_disks: Some(disks),
                network_devices: Some(vec![WireNetworkDevice {
                    name: Some("Network adapter 1".to_owned()),
                    mo_ref: Some("4000".to_owned()),
                    network_name: Some(vm.default_network.clone()),
                    mac_address: None,
                    connected: true,
                    start_connected: true,
                    network_id: Some(vm.default_network.clone()),
                }]),
                hosting_location_id: Some(vm.hosting_location_id.clone()),
                backup_type: Some(vm.backup_type.clone()),
            },
        })
    }

    pub(crate) fn power_off(&self, raw_id: &str) -> Result<(), MockError> {
        let id = parse_vm_id(raw_id)?;
        let mut state = self.lock();
        let vm = state
            .vms
            .get_mut(&id)
            .ok_or_else(|| MockError::VmNotFound(raw_id.to_owned()))?;
        POWERED_OFF.clone_into(&mut vm.power_state);
        info!(vm_id = id, "mock machine powered off");
        Ok(())
    }

    pub(crate) fn delete_vm(&self, raw_id: &str, check_token: &str) -> Result<(), MockError> {
        let id = parse_vm_id(raw_id)?;
        let mut state = self.lock();
        let vm = state
            .vms
            .get(&id)
            .ok_or_else(|| MockError::VmNotFound(raw_id.to_owned()))?;
        if vm.mo_ref != check_token {
            return Err(MockError::CheckTokenMismatch(raw_id.to_owned()));
        }
        if vm.power_state != POWERED_OFF {
            return Err(MockError::NotPoweredOff(raw_id.to_owned()));
        }
        state.vms.remove(&id);
        info!(vm_id = id, "mock machine deleted");
        Ok(())
    }

    pub(crate) fn add_disk(&self, raw_id: &str, tier: &str, size: u32) -> Result<String, MockError> {
        missing_if(size == 0 || tier.trim().is_empty())?;
        let id = parse_vm_id(raw_id)?;
        let mut state = self.lock();
        let vm = state
            .vms
            .get_mut(&id)
            .ok_or_else(|| MockError::VmNotFound(raw_id.to_owned()))?;
        let mo_ref = vm.push_disk(size, tier, self.settings.disk_delay);
        info!(vm_id = id, mo_ref = %mo_ref, "mock disk added");
        Ok(mo_ref)
    }

    pub(crate) fn create_bucket(
        &self,
        tenant_id: u64,
        canonical_user_id: &str,
        bucket_name: &str,
    ) -> Result<(), MockError> {
        missing_if(bucket_name.trim().is_empty() || canonical_user_id.trim().is_empty())?;
        let mut state = self.lock();
        let users = state.buckets.entry(tenant_id).or_default();
        if users.values().flatten().any(|existing| existing == bucket_name) {
            return Err(MockError::BucketExists(bucket_name.to_owned()));
        }
        users
            .entry(canonical_user_id.to_owned())
            .or_default()
            .push(bucket_name.to_owned());
        Ok(())
    }

    pub(crate) fn object_storage(&self, tenant_id: u64) -> ObjectStorageDetail {
        let state = self.lock();
        let users = state
            .buckets
            .get(&tenant_id)
            .map(|users| {
                users
                    .values()
                    .map(|names| ObjectStorageUser {
                        buckets: names
                            .iter()
                            .map(|name| BucketEntry {
                                bucket_name: name.clone(),
                            })
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        ObjectStorageDetail { users }
    }

    pub(crate) fn delete_bucket(
        &self,
        tenant_id: u64,
        canonical_user_id: &str,
        bucket_name: &str,
    ) -> Result<(), MockError> {
        let mut state = self.lock();
        let names = state
            .buckets
            .get_mut(&tenant_id)
            .and_then(|users| users.get_mut(canonical_user_id))
            .ok_or_else(|| MockError::BucketNotFound(bucket_name.to_owned()))?;
        let before = names.len();
        names.retain(|name| name != bucket_name);
        if names.len() == before {
            return Err(MockError::BucketNotFound(bucket_name.to_owned()));
        }
        Ok(())
    }
}
