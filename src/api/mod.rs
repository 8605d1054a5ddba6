//! Typed remote contract used by the correlation engine and orchestrator.
//!
//! Every mutating call only acknowledges acceptance; none returns a durable
//! identifier. Read calls return normalized domain values.

use std::future::Future;
use std::pin::Pin;

mod http;
pub(crate) mod payload;

pub use http::{ClientError, HttpApi};

use crate::model::{BucketRequest, DiskSpec, MoRef, VirtualMachine, VmDetail, VmId, VmSummary};

/// Future returned by API operations.
pub type ApiFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Virtual machine operations offered by the provider.
pub trait VirtualMachineApi: Send + Sync {
    /// Error type returned by every call.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Submits the desired state of a new virtual machine.
    fn create_vm<'a>(&'a self, machine: &'a VirtualMachine) -> ApiFuture<'a, (), Self::Error>;

    /// Lists the virtual resources visible within a tenant scope.
    fn list_vms(&self, client_id: u64) -> ApiFuture<'_, Vec<VmSummary>, Self::Error>;

    /// Reads the full detail of a virtual machine.
    fn vm_detail<'a>(&'a self, vm_id: &'a VmId) -> ApiFuture<'a, VmDetail, Self::Error>;

    /// Requests a power-off. Completion is not confirmed by the provider.
    fn power_off<'a>(&'a self, vm_id: &'a VmId) -> ApiFuture<'a, (), Self::Error>;

    /// Deletes a virtual machine. `check_token` must equal its current moRef.
    fn delete_vm<'a>(
        &'a self,
        vm_id: &'a VmId,
        check_token: &'a MoRef,
    ) -> ApiFuture<'a, (), Self::Error>;

    /// Submits a new disk for a virtual machine.
    fn add_disk<'a>(&'a self, vm_id: &'a VmId, disk: &'a DiskSpec)
    -> ApiFuture<'a, (), Self::Error>;
}

/// Object-storage operations offered by the provider.
pub trait ObjectStorageApi: VirtualMachineApi {
    /// Submits a new bucket.
    fn create_bucket<'a>(&'a self, request: &'a BucketRequest) -> ApiFuture<'a, (), Self::Error>;

    /// Lists bucket names across every user of a tenant, in listing order.
    fn list_bucket_names(&self, tenant_id: u64) -> ApiFuture<'_, Vec<String>, Self::Error>;

    /// Deletes a bucket.
    fn delete_bucket<'a>(&'a self, request: &'a BucketRequest) -> ApiFuture<'a, (), Self::Error>;
}
