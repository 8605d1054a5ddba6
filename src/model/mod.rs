//! Domain model for virtual machines, their disks and specification snapshots.
//!
//! Values are built locally from the caller's desired state, submitted, and
//! only acquire a durable identifier once correlation confirms they exist
//! remotely. Read paths decode the provider's wire shapes in [`wire`] and
//! normalize them into these types exactly once.

mod bucket;
mod disk;
mod machine;
mod types;
pub(crate) mod wire;

use thiserror::Error;

pub use bucket::BucketRequest;
pub use disk::{DiskSpec, VirtualDisk, backend_tier, friendly_tier, normalize_capacity};
pub use machine::{
    HostingLocation, NetworkDevice, OperatingSystemDisk, Specification, VirtualMachine,
    VirtualMachineBuilder, VmDetail, VmSummary,
};
pub use types::{MoRef, VmId};

/// Errors raised when a desired-state value is incomplete or inconsistent.
///
/// These are always detected before any network call and are never retried.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    /// Raised when a required field is missing or blank.
    #[error("missing or empty field: {0}")]
    MissingField(String),
    /// Raised when a sizing field is zero.
    #[error("field {field} must be greater than zero")]
    NotPositive {
        /// Name of the offending field.
        field: String,
    },
    /// Raised when both a template and an explicit OS disk capacity are set.
    #[error("`operating_system_disk_capacity` should not be set when `template` is specified")]
    TemplateWithCapacity,
    /// Raised when neither a template nor an OS disk capacity is set.
    #[error("`operating_system_disk_capacity` is required when `template` is not specified")]
    MissingTemplateOrCapacity,
    /// Raised when an identifier is assigned to a value that already has one.
    #[error("virtual machine {name} already carries identifier {id}")]
    AlreadyIdentified {
        /// Desired name of the virtual machine.
        name: String,
        /// Identifier already assigned.
        id: VmId,
    },
}

/// Errors raised when a read-path value cannot be normalized.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum NormalizationError {
    /// Raised when a reported disk capacity is not a usable whole number.
    #[error("disk capacity {value} cannot be represented as a whole number of gigabytes")]
    Capacity {
        /// Raw value reported by the provider.
        value: f64,
    },
}

pub(crate) fn require_text(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field.to_owned()));
    }
    Ok(())
}

pub(crate) fn require_positive(value: u64, field: &str) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::NotPositive {
            field: field.to_owned(),
        });
    }
    Ok(())
}
