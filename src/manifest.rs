//! Caller manifest loading.
//!
//! A manifest is a JSON document describing the desired state of one virtual
//! machine with snake_case keys. Every required field is checked before any
//! network call; unknown keys are rejected so typos do not silently drop
//! settings.

use std::collections::BTreeMap;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;
use thiserror::Error;

use crate::model::{DiskSpec, ValidationError, VirtualMachine};

/// Errors raised while loading a manifest.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ManifestError {
    /// Raised when the manifest path is empty or only whitespace.
    #[error("manifest path must not be empty")]
    PathEmpty,
    /// Raised when reading the manifest fails.
    #[error("failed to read manifest `{path}`: {message}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the manifest is not valid JSON for the schema.
    #[error("failed to parse manifest `{path}`: {message}")]
    Parse {
        /// Path of the manifest.
        path: String,
        /// Decoder error message.
        message: String,
    },
    /// Raised when the manifest is well formed but incomplete or inconsistent.
    #[error("invalid manifest: {0}")]
    Invalid(#[from] ValidationError),
}

/// Additional disk entry of a manifest.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DiskManifest {
    /// Size in gigabytes.
    pub capacity: Option<u32>,
    /// Storage profile, for example `vStorageT2`.
    pub storage_profile: Option<String>,
}

/// Desired state of a virtual machine as written by the caller.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VirtualMachineManifest {
    /// Tenant scope.
    pub client_id: Option<u64>,
    /// Machine name.
    pub name: Option<String>,
    /// Template to clone from.
    pub template: Option<String>,
    /// Guest operating system identifier.
    pub guest_os_id: Option<String>,
    /// Number of cores.
    pub cores: Option<u32>,
    /// Memory size in gigabytes.
    pub memory_size: Option<u32>,
    /// OS disk size; only without a template.
    pub operating_system_disk_capacity: Option<u32>,
    /// OS disk storage profile.
    pub operating_system_disk_storage_profile: Option<String>,
    /// Disks created alongside the machine.
    #[serde(default)]
    pub additional_disks: Vec<DiskManifest>,
    /// ISO image to mount.
    pub iso_file: Option<String>,
    /// Quote metadata.
    #[serde(default)]
    pub quote_item: BTreeMap<String, String>,
    /// Hosting location identifier.
    pub hosting_location_id: Option<String>,
    /// Hosting location name.
    pub hosting_location_name: Option<String>,
    /// Default network of the hosting location.
    pub hosting_location_default_network: Option<String>,
    /// Backup policy name.
    pub backup_type: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::MissingField(field.to_owned()))
}

impl DiskManifest {
    fn into_spec(self) -> Result<DiskSpec, ValidationError> {
        DiskSpec::new(
            required(self.capacity, "capacity")?,
            required(self.storage_profile, "storage_profile")?,
        )
    }
}

impl VirtualMachineManifest {
    /// Maps the manifest onto a validated [`VirtualMachine`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for the first missing or inconsistent field.
    pub fn into_machine(self) -> Result<VirtualMachine, ValidationError> {
        let mut builder = VirtualMachine::builder()
            .client_id(required(self.client_id, "client_id")?)
            .name(required(self.name, "name")?)
            .template(self.template)
            .guest_os_id(required(self.guest_os_id, "guest_os_id")?)
            .cores(required(self.cores, "cores")?)
            .memory_size(required(self.memory_size, "memory_size")?)
            .operating_system_disk_capacity(self.operating_system_disk_capacity)
            .operating_system_disk_storage_profile(required(
                self.operating_system_disk_storage_profile,
                "operating_system_disk_storage_profile",
            )?)
            .iso_file(self.iso_file)
            .hosting_location(
                required(self.hosting_location_id, "hosting_location_id")?,
                required(self.hosting_location_name, "hosting_location_name")?,
                required(
                    self.hosting_location_default_network,
                    "hosting_location_default_network",
                )?,
            )
            .backup_type(required(self.backup_type, "backup_type")?);

        for disk in self.additional_disks {
            builder = builder.additional_disk(disk.into_spec()?);
        }
        for (key, value) in self.quote_item {
            builder = builder.quote_item(key, value);
        }
        builder.build()
    }
}

/// Parses manifest text. `origin` names the source in error messages.
///
/// # Errors
///
/// Returns [`ManifestError::Parse`] for malformed JSON or unknown keys and
/// [`ManifestError::Invalid`] for missing or inconsistent fields.
pub fn parse_manifest(text: &str, origin: &str) -> Result<VirtualMachine, ManifestError> {
    let manifest: VirtualMachineManifest =
        serde_json::from_str(text).map_err(|err| ManifestError::Parse {
            path: origin.to_owned(),
            message: err.to_string(),
        })?;
    manifest.into_machine().map_err(ManifestError::from)
}

/// Reads and parses a manifest file.
///
/// # Errors
///
/// Returns [`ManifestError`] when the path is empty, the file cannot be read
/// or its content is invalid.
pub fn load_manifest(path: &str) -> Result<VirtualMachine, ManifestError> {
    if path.trim().is_empty() {
        return Err(ManifestError::PathEmpty);
    }
    let content = read_to_string_ambient(path).map_err(|message| ManifestError::Read {
        path: path.to_owned(),
        message,
    })?;
    parse_manifest(&content, path)
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;

    const TEMPLATE_MANIFEST: &str = r#"{
        "client_id": 123,
        "name": "test-vm-2",
        "template": "template-123",
        "guest_os_id": "os-123",
        "cores": 4,
        "memory_size": 8,
        "operating_system_disk_storage_profile": "vStorageT1",
        "additional_disks": [{"capacity": 50, "storage_profile": "vStorageT2"}],
        "quote_item": {"sku": "vm-small"},
        "hosting_location_id": "vcchcres",
        "hosting_location_name": "Christchurch",
        "hosting_location_default_network": "net-1",
        "backup_type": "vBackupNone"
    }"#;

    #[test]
    fn template_manifest_maps_onto_machine() {
        let machine = parse_manifest(TEMPLATE_MANIFEST, "inline")
            .unwrap_or_else(|err| panic!("parse manifest: {err}"));

        assert_eq!(machine.name, "test-vm-2");
        assert_eq!(machine.template.as_deref(), Some("template-123"));
        assert_eq!(machine.operating_system_disk.capacity, None);
        assert_eq!(machine.additional_disks.len(), 1);
        assert_eq!(machine.quote_item.get("sku").map(String::as_str), Some("vm-small"));
        assert_eq!(machine.hosting_location.id, "vcchcres");
        assert_eq!(machine.identifier(), None);
    }

    #[rstest]
    #[case::missing_name(r#"{"client_id": 1}"#, "name")]
    #[case::missing_client(r#"{"name": "vm"}"#, "client_id")]
    fn missing_fields_are_named(#[case] text: &str, #[case] field: &str) {
        let err = parse_manifest(text, "inline").expect_err("incomplete manifest");
        assert_eq!(
            err,
            ManifestError::Invalid(ValidationError::MissingField(field.to_owned()))
        );
    }

    #[test]
    fn template_and_capacity_together_are_rejected() {
        let text = TEMPLATE_MANIFEST.replace(
            "\"cores\": 4,",
            "\"cores\": 4, \"operating_system_disk_capacity\": 40,",
        );
        let err = parse_manifest(&text, "inline").expect_err("conflicting disk settings");
        assert_eq!(
            err,
            ManifestError::Invalid(ValidationError::TemplateWithCapacity)
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = TEMPLATE_MANIFEST.replace("\"cores\"", "\"core_count\"");
        let err = parse_manifest(&text, "inline").expect_err("unknown key");
        assert!(
            matches!(err, ManifestError::Parse { ref message, .. } if message.contains("core_count")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn manifest_is_read_from_absolute_path() {
        let mut file = NamedTempFile::new().unwrap_or_else(|err| panic!("temp file: {err}"));
        file.write_all(TEMPLATE_MANIFEST.as_bytes())
            .unwrap_or_else(|err| panic!("write manifest: {err}"));
        let path = file
            .path()
            .to_str()
            .unwrap_or_else(|| panic!("temp path should be utf8"));

        let machine = load_manifest(path).unwrap_or_else(|err| panic!("load manifest: {err}"));
        assert_eq!(machine.client_id, 123);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn empty_path_is_rejected(#[case] path: &str) {
        assert_eq!(load_manifest(path), Err(ManifestError::PathEmpty));
    }

    #[test]
    fn missing_file_reports_read_error() {
        let err = load_manifest("/definitely/not/here/vm.json").expect_err("missing file");
        assert!(matches!(err, ManifestError::Read { .. }));
    }
}
