//! Command-line interface definitions for the `vbridge` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Top-level CLI for the `vbridge` binary.
#[derive(Debug, Parser)]
#[command(
    name = "vbridge",
    about = "Provision and decommission virtual machines on the hosting provider",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Submit a machine manifest and print the identifier the provider assigned.
    #[command(
        name = "provision",
        about = "Submit a machine manifest and print its identifier"
    )]
    Provision(ProvisionCommand),
    /// Attach a new disk to a machine and print the disk's moRef.
    #[command(name = "add-disk", about = "Attach a new disk and print its moRef")]
    AddDisk(AddDiskCommand),
    /// Power off and delete a machine.
    #[command(name = "decommission", about = "Power off and delete a machine")]
    Decommission(VmCommand),
    /// Print the normalized detail of a machine as JSON.
    #[command(name = "show", about = "Print the normalized machine detail as JSON")]
    Show(VmCommand),
    /// Print one additional disk of a machine as JSON.
    #[command(name = "show-disk", about = "Print one disk of a machine as JSON")]
    ShowDisk(ShowDiskCommand),
    /// Create an object-storage bucket and wait until it is listed.
    #[command(name = "create-bucket", about = "Create an object-storage bucket")]
    CreateBucket(CreateBucketCommand),
    /// Delete an object-storage bucket.
    #[command(name = "delete-bucket", about = "Delete an object-storage bucket")]
    DeleteBucket(BucketTarget),
}

/// Arguments for the `vbridge provision` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ProvisionCommand {
    /// Path to the JSON machine manifest.
    ///
    /// Keys are snake_case and unknown keys are rejected. Exactly one of
    /// `template` and `operating_system_disk_capacity` must be present.
    #[arg(long, value_name = "PATH")]
    pub(crate) manifest: String,
}

/// Accepts the provider's numeric machine identifiers only.
fn numeric_id(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return Ok(trimmed.to_owned());
    }
    Err(format!("`{raw}` is not a numeric machine identifier"))
}

/// Arguments for the `vbridge add-disk` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct AddDiskCommand {
    /// Identifier of the target machine.
    #[arg(long, value_name = "ID", value_parser = numeric_id)]
    pub(crate) vm_id: String,
    /// Disk size in gigabytes.
    #[arg(long, value_name = "GB")]
    pub(crate) capacity: u32,
    /// Storage profile, for example `vStorageT1`.
    #[arg(long, value_name = "PROFILE")]
    pub(crate) storage_profile: String,
}

/// Arguments naming one machine.
#[derive(Debug, Parser)]
pub(crate) struct VmCommand {
    /// Identifier of the machine.
    #[arg(long, value_name = "ID", value_parser = numeric_id)]
    pub(crate) vm_id: String,
}

/// Arguments for the `vbridge show-disk` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ShowDiskCommand {
    /// Identifier of the machine.
    #[arg(long, value_name = "ID", value_parser = numeric_id)]
    pub(crate) vm_id: String,
    /// Handle of the disk, as printed by `add-disk`.
    #[arg(long, value_name = "MOREF")]
    pub(crate) mo_ref: String,
}

/// Arguments naming one bucket.
#[derive(Debug, Args)]
pub(crate) struct BucketTarget {
    /// Tenant owning the bucket.
    #[arg(long, value_name = "ID")]
    pub(crate) tenant_id: u64,
    /// Canonical object-storage user of the tenant.
    #[arg(long, value_name = "USER")]
    pub(crate) canonical_user_id: String,
    /// Bucket name.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: String,
}

/// Arguments for the `vbridge create-bucket` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CreateBucketCommand {
    #[command(flatten)]
    pub(crate) target: BucketTarget,
    /// Enable object lock on the new bucket.
    #[arg(long)]
    pub(crate) object_lock: bool,
}
