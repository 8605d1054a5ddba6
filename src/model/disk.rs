//! Disk value types and the capacity/tier normalization step.

use serde::Serialize;

use super::{MoRef, NormalizationError, ValidationError, require_positive, require_text};

/// Backend tier names paired with the storage profiles callers write.
const TIER_NAMES: [(&str, &str); 3] = [
    ("Performance", "vStorageT1"),
    ("General Purpose", "vStorageT2"),
    ("Low Use", "vStorageT3"),
];

/// Desired state of a disk at creation time.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DiskSpec {
    /// Size in gigabytes.
    pub capacity: u32,
    /// Storage profile, for example `vStorageT1`.
    pub storage_profile: String,
}

impl DiskSpec {
    /// Builds a disk specification, trimming the storage profile.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the capacity is zero or the storage
    /// profile is blank.
    pub fn new(capacity: u32, storage_profile: impl Into<String>) -> Result<Self, ValidationError> {
        let spec = Self {
            capacity,
            storage_profile: storage_profile.into().trim().to_owned(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Checks the capacity and storage profile.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when either field is unusable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive(u64::from(self.capacity), "capacity")?;
        require_text(&self.storage_profile, "storage_profile")
    }
}

/// A disk attached to a virtual machine as reported by a detail read.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VirtualDisk {
    /// Remote-assigned handle.
    pub mo_ref: MoRef,
    /// Size in gigabytes, always a whole number.
    pub capacity: u32,
    /// Storage tier using the caller-facing profile name where known.
    pub tier: String,
    /// Display name reported by the provider.
    pub name: String,
    /// Datastore hosting the disk.
    pub vmfs: String,
    /// Controller slot description.
    pub slot_info: String,
    /// Human readable capacity, for example `100 GB`.
    pub capacity_description: String,
}

/// Converts a read-path capacity into whole gigabytes.
///
/// Finite, non-negative values are truncated toward zero.
///
/// # Errors
///
/// Returns [`NormalizationError::Capacity`] for negative, non-finite or
/// out-of-range values.
pub fn normalize_capacity(raw: f64) -> Result<u32, NormalizationError> {
    if !raw.is_finite() || raw < 0.0 || raw.trunc() > f64::from(u32::MAX) {
        return Err(NormalizationError::Capacity { value: raw });
    }
    Ok(truncate_to_u32(raw))
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "range and sign are checked by normalize_capacity"
)]
const fn truncate_to_u32(value: f64) -> u32 {
    value as u32
}

/// Translates a backend tier name (`Performance`) into the storage profile
/// used on write paths (`vStorageT1`). Unknown tiers pass through unchanged.
#[must_use]
pub fn friendly_tier(backend: &str) -> &str {
    TIER_NAMES
        .iter()
        .find(|(name, _)| *name == backend)
        .map_or(backend, |&(_, profile)| profile)
}

/// Translates a storage profile back into the backend tier name.
#[must_use]
pub fn backend_tier(profile: &str) -> &str {
    TIER_NAMES
        .iter()
        .find(|(_, friendly)| *friendly == profile)
        .map_or(profile, |&(name, _)| name)
}
