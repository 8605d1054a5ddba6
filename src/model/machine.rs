//! Virtual machine desired state and the snapshots read back from the provider.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{
    DiskSpec, MoRef, ValidationError, VirtualDisk, VmId, require_positive, require_text,
};

/// Placement of a virtual machine.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct HostingLocation {
    /// Provider identifier of the hosting location.
    pub id: String,
    /// Display name of the hosting location.
    pub name: String,
    /// Network attached by default. Empty when a read path does not report it.
    pub default_network: String,
}

/// Operating system disk of a virtual machine.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct OperatingSystemDisk {
    /// Size in gigabytes. Absent when the machine is cloned from a template.
    pub capacity: Option<u32>,
    /// Storage profile, for example `vStorageT1`.
    pub storage_profile: String,
}

/// Desired state of a virtual machine.
///
/// The durable identifier stays empty until correlation confirms the machine
/// exists remotely and cannot be replaced once assigned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VirtualMachine {
    /// Tenant scope used to partition listings.
    pub client_id: u64,
    /// Desired name, used for correlation after submission.
    pub name: String,
    /// Template to clone from, if any.
    pub template: Option<String>,
    /// Guest operating system identifier.
    pub guest_os_id: String,
    /// Number of virtual CPU cores.
    pub cores: u32,
    /// Memory size in gigabytes.
    pub memory_size: u32,
    /// Operating system disk.
    pub operating_system_disk: OperatingSystemDisk,
    /// Disks created alongside the machine.
    pub additional_disks: Vec<DiskSpec>,
    /// ISO image to mount at creation.
    pub iso_file: Option<String>,
    /// Commercial quote metadata forwarded verbatim.
    pub quote_item: BTreeMap<String, String>,
    /// Placement of the machine.
    pub hosting_location: HostingLocation,
    /// Backup policy name.
    pub backup_type: String,
    identifier: Option<VmId>,
}

impl VirtualMachine {
    /// Starts a builder for a [`VirtualMachine`].
    #[must_use]
    pub fn builder() -> VirtualMachineBuilder {
        VirtualMachineBuilder::new()
    }

    /// Returns the durable identifier once the machine has been resolved.
    #[must_use]
    pub const fn identifier(&self) -> Option<&VmId> {
        self.identifier.as_ref()
    }

    /// Records the identifier produced by correlation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AlreadyIdentified`] when an identifier is
    /// already present.
    pub fn assign_identifier(&mut self, id: VmId) -> Result<(), ValidationError> {
        if let Some(existing) = &self.identifier {
            return Err(ValidationError::AlreadyIdentified {
                name: self.name.clone(),
                id: existing.clone(),
            });
        }
        self.identifier = Some(id);
        Ok(())
    }

    /// Validates the desired state, returning the first problem found.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a required field is blank or zero, or
    /// when the template/OS disk capacity pairing is inconsistent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive(self.client_id, "client_id")?;
        require_text(&self.name, "name")?;
        require_text(&self.guest_os_id, "guest_os_id")?;
        require_positive(u64::from(self.cores), "cores")?;
        require_positive(u64::from(self.memory_size), "memory_size")?;
        require_text(
            &self.operating_system_disk.storage_profile,
            "operating_system_disk_storage_profile",
        )?;
        require_text(&self.hosting_location.id, "hosting_location_id")?;
        require_text(&self.hosting_location.name, "hosting_location_name")?;
        require_text(
            &self.hosting_location.default_network,
            "hosting_location_default_network",
        )?;
        require_text(&self.backup_type, "backup_type")?;

        match (&self.template, self.operating_system_disk.capacity) {
            (Some(_), Some(_)) => return Err(ValidationError::TemplateWithCapacity),
            (None, None) => return Err(ValidationError::MissingTemplateOrCapacity),
            (None, Some(capacity)) => {
                require_positive(u64::from(capacity), "operating_system_disk_capacity")?;
            }
            (Some(_), None) => {}
        }

        for disk in &self.additional_disks {
            disk.validate()?;
        }
        Ok(())
    }
}

/// Builder for [`VirtualMachine`] that trims string inputs and validates on
/// construction. Blank optional strings count as absent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VirtualMachineBuilder {
    client_id: u64,
    name: String,
    template: Option<String>,
    guest_os_id: String,
    cores: u32,
    memory_size: u32,
    operating_system_disk_capacity: Option<u32>,
    operating_system_disk_storage_profile: String,
    additional_disks: Vec<DiskSpec>,
    iso_file: Option<String>,
    quote_item: BTreeMap<String, String>,
    hosting_location: HostingLocation,
    backup_type: String,
}

impl VirtualMachineBuilder {
    /// Creates an empty builder; required fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tenant scope.
    #[must_use]
    pub const fn client_id(mut self, value: u64) -> Self {
        self.client_id = value;
        self
    }

    /// Sets the desired name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the optional template.
    #[must_use]
    pub fn template(mut self, value: Option<String>) -> Self {
        self.template = value;
        self
    }

    /// Sets the guest operating system identifier.
    #[must_use]
    pub fn guest_os_id(mut self, value: impl Into<String>) -> Self {
        self.guest_os_id = value.into();
        self
    }

    /// Sets the number of cores.
    #[must_use]
    pub const fn cores(mut self, value: u32) -> Self {
        self.cores = value;
        self
    }

    /// Sets the memory size in gigabytes.
    #[must_use]
    pub const fn memory_size(mut self, value: u32) -> Self {
        self.memory_size = value;
        self
    }

    /// Sets the operating system disk capacity in gigabytes.
    #[must_use]
    pub const fn operating_system_disk_capacity(mut self, value: Option<u32>) -> Self {
        self.operating_system_disk_capacity = value;
        self
    }

    /// Sets the operating system disk storage profile.
    #[must_use]
    pub fn operating_system_disk_storage_profile(mut self, value: impl Into<String>) -> Self {
        self.operating_system_disk_storage_profile = value.into();
        self
    }

    /// Appends an additional disk.
    #[must_use]
    pub fn additional_disk(mut self, disk: DiskSpec) -> Self {
        self.additional_disks.push(disk);
        self
    }

    /// Sets the optional ISO file.
    #[must_use]
    pub fn iso_file(mut self, value: Option<String>) -> Self {
        self.iso_file = value;
        self
    }

    /// Adds a quote item entry.
    #[must_use]
    pub fn quote_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.quote_item.insert(key.into(), value.into());
        self
    }

    /// Sets the hosting location.
    #[must_use]
    pub fn hosting_location(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        default_network: impl Into<String>,
    ) -> Self {
        self.hosting_location = HostingLocation {
            id: id.into(),
            name: name.into(),
            default_network: default_network.into(),
        };
        self
    }

    /// Sets the backup type.
    #[must_use]
    pub fn backup_type(mut self, value: impl Into<String>) -> Self {
        self.backup_type = value.into();
        self
    }

    /// Builds and validates the [`VirtualMachine`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when any required field is missing or the
    /// request is inconsistent.
    pub fn build(self) -> Result<VirtualMachine, ValidationError> {
        let machine = VirtualMachine {
            client_id: self.client_id,
            name: self.name.trim().to_owned(),
            template: trim_optional(self.template),
            guest_os_id: self.guest_os_id.trim().to_owned(),
            cores: self.cores,
            memory_size: self.memory_size,
            operating_system_disk: OperatingSystemDisk {
                capacity: self.operating_system_disk_capacity,
                storage_profile: self.operating_system_disk_storage_profile.trim().to_owned(),
            },
            additional_disks: self.additional_disks,
            iso_file: trim_optional(self.iso_file),
            quote_item: self.quote_item,
            hosting_location: HostingLocation {
                id: self.hosting_location.id.trim().to_owned(),
                name: self.hosting_location.name.trim().to_owned(),
                default_network: self.hosting_location.default_network.trim().to_owned(),
            },
            backup_type: self.backup_type.trim().to_owned(),
            identifier: None,
        };
        machine.validate()?;
        Ok(machine)
    }
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// One entry of a tenant's virtual resource listing.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VmSummary {
    /// Durable identifier.
    pub id: VmId,
    /// Name as reported by the provider.
    pub name: String,
    /// Hosting location name, empty when not reported.
    pub hosting_location: String,
}

/// Network adapter reported in a [`Specification`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct NetworkDevice {
    /// Adapter name.
    pub name: String,
    /// Remote handle of the adapter.
    pub mo_ref: String,
    /// Name of the attached network.
    pub network_name: String,
    /// Hardware address.
    pub mac_address: String,
    /// Whether the adapter is currently connected.
    pub connected: bool,
    /// Whether the adapter connects at power-on.
    pub start_connected: bool,
    /// Identifier of the attached network.
    pub network_id: String,
}

/// Point-in-time snapshot of a machine's remote state.
///
/// Never mutated locally; every detail read produces a fresh value.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Specification {
    /// Health reported by the hypervisor.
    pub health_state: String,
    /// Power state, for example `PoweredOn`.
    pub power_state: String,
    /// Number of cores.
    pub cores: u32,
    /// Number of sockets.
    pub sockets: u32,
    /// Memory in gigabytes.
    pub memory_gb: u32,
    /// Machine handle, also the check token required by delete.
    pub mo_ref: MoRef,
    /// Attached disks in listing order.
    pub virtual_disks: Vec<VirtualDisk>,
    /// Attached network adapters.
    pub network_devices: Vec<NetworkDevice>,
    /// Identifier of the hosting location.
    pub hosting_location_id: String,
    /// Backup policy name.
    pub backup_type: String,
}

impl Specification {
    /// Returns the disk handles in listing order.
    pub fn disk_handles(&self) -> impl Iterator<Item = &MoRef> {
        self.virtual_disks.iter().map(|disk| &disk.mo_ref)
    }

    /// Finds a disk by handle.
    #[must_use]
    pub fn disk(&self, mo_ref: &MoRef) -> Option<&VirtualDisk> {
        self.virtual_disks.iter().find(|disk| &disk.mo_ref == mo_ref)
    }
}

/// Normalized detail view of a virtual machine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VmDetail {
    /// Durable identifier.
    pub id: VmId,
    /// Tenant scope.
    pub client_id: u64,
    /// Name as reported by the provider.
    pub name: String,
    /// Guest operating system label, when reported.
    pub guest_os: Option<String>,
    /// Hosting location name.
    pub hosting_location: String,
    /// Mounted ISO image, when any.
    pub mounted_iso: Option<String>,
    /// Remote state snapshot.
    pub specification: Specification,
}
