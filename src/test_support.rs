//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::api::{ApiFuture, ObjectStorageApi, VirtualMachineApi};
use crate::model::{
    BucketRequest, DiskSpec, MoRef, Specification, VirtualDisk, VirtualMachine, VmDetail, VmId,
    VmSummary,
};

/// Operations of the provider contract, used to inject failures.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ApiOperation {
    /// Create a virtual machine.
    CreateVm,
    /// List a tenant's virtual machines.
    ListVms,
    /// Read a virtual machine's detail.
    VmDetail,
    /// Power a virtual machine off.
    PowerOff,
    /// Delete a virtual machine.
    DeleteVm,
    /// Add a disk to a virtual machine.
    AddDisk,
    /// Create a bucket.
    CreateBucket,
    /// List a tenant's buckets.
    ListBuckets,
    /// Delete a bucket.
    DeleteBucket,
}

/// Records a single call made through [`ScriptedApi`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiCall {
    /// `create_vm` with the submitted name.
    CreateVm {
        /// Submitted name.
        name: String,
    },
    /// `list_vms` for a scope.
    ListVms {
        /// Tenant scope.
        client_id: u64,
    },
    /// `vm_detail` for a machine.
    VmDetail {
        /// Target machine.
        vm_id: VmId,
    },
    /// `power_off` for a machine.
    PowerOff {
        /// Target machine.
        vm_id: VmId,
    },
    /// `delete_vm` with its check token.
    DeleteVm {
        /// Target machine.
        vm_id: VmId,
        /// Check token sent with the delete.
        check_token: MoRef,
    },
    /// `add_disk` with the submitted disk.
    AddDisk {
        /// Target machine.
        vm_id: VmId,
        /// Submitted disk.
        disk: DiskSpec,
    },
    /// `create_bucket` with the bucket name.
    CreateBucket {
        /// Bucket name.
        bucket_name: String,
    },
    /// `list_bucket_names` for a tenant.
    ListBuckets {
        /// Tenant identifier.
        tenant_id: u64,
    },
    /// `delete_bucket` with the bucket name.
    DeleteBucket {
        /// Bucket name.
        bucket_name: String,
    },
}

impl ApiCall {
    /// Operation this call belongs to.
    #[must_use]
    pub const fn operation(&self) -> ApiOperation {
        match self {
            Self::CreateVm { .. } => ApiOperation::CreateVm,
            Self::ListVms { .. } => ApiOperation::ListVms,
            Self::VmDetail { .. } => ApiOperation::VmDetail,
            Self::PowerOff { .. } => ApiOperation::PowerOff,
            Self::DeleteVm { .. } => ApiOperation::DeleteVm,
            Self::AddDisk { .. } => ApiOperation::AddDisk,
            Self::CreateBucket { .. } => ApiOperation::CreateBucket,
            Self::ListBuckets { .. } => ApiOperation::ListBuckets,
            Self::DeleteBucket { .. } => ApiOperation::DeleteBucket,
        }
    }
}

/// Failure returned by [`ScriptedApi`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted {operation:?} failure: {message}")]
pub struct ScriptedApiError {
    /// Operation that failed.
    pub operation: ApiOperation,
    /// Scripted failure message.
    pub message: String,
}

/// A queued response: a value, or the message of a one-off failure.
type Scripted<T> = Result<T, String>;

#[derive(Debug, Default)]
struct Script {
    listings: VecDeque<Scripted<Vec<VmSummary>>>,
    details: VecDeque<Scripted<VmDetail>>,
    bucket_listings: VecDeque<Scripted<Vec<String>>>,
    failures: BTreeMap<ApiOperation, String>,
    calls: Vec<ApiCall>,
}

/// Pops the next scripted response, repeating the last one once the queue
/// holds a single entry.
fn next_response<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        return queue.pop_front();
    }
    queue.front().cloned()
}

/// Scripted provider double that returns queued responses in FIFO order.
///
/// Used to drive deterministic correlation and lifecycle outcomes without a
/// network. Clones share the same script.
#[derive(Clone, Debug, Default)]
pub struct ScriptedApi {
    script: Arc<Mutex<Script>>,
}

impl ScriptedApi {
    /// Creates a double with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a listing response.
    pub fn push_listing(&self, entries: Vec<VmSummary>) {
        self.script().listings.push_back(Ok(entries));
    }

    /// Queues a listing call that fails with `message`.
    pub fn push_listing_failure(&self, message: impl Into<String>) {
        self.script().listings.push_back(Err(message.into()));
    }

    /// Queues a detail response.
    pub fn push_detail(&self, detail: VmDetail) {
        self.script().details.push_back(Ok(detail));
    }

    /// Queues a detail read that fails with `message`.
    pub fn push_detail_failure(&self, message: impl Into<String>) {
        self.script().details.push_back(Err(message.into()));
    }

    /// Queues a bucket-name listing.
    pub fn push_bucket_listing(&self, names: Vec<String>) {
        self.script().bucket_listings.push_back(Ok(names));
    }

    /// Queues a bucket listing that fails with `message`.
    pub fn push_bucket_listing_failure(&self, message: impl Into<String>) {
        self.script().bucket_listings.push_back(Err(message.into()));
    }

    /// Makes every subsequent call of `operation` fail with `message`.
    pub fn fail_on(&self, operation: ApiOperation, message: impl Into<String>) {
        self.script().failures.insert(operation, message.into());
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.script().calls.clone()
    }

    /// Counts recorded calls of one operation.
    #[must_use]
    pub fn count(&self, operation: ApiOperation) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    fn record(&self, call: ApiCall) -> Result<(), ScriptedApiError> {
        let operation = call.operation();
        let mut script = self.script();
        script.calls.push(call);
        script
            .failures
            .get(&operation)
            .map_or(Ok(()), |message| {
                Err(ScriptedApiError {
                    operation,
                    message: message.clone(),
                })
            })
    }
}

impl VirtualMachineApi for ScriptedApi {
    type Error = ScriptedApiError;

    fn create_vm<'a>(&'a self, machine: &'a VirtualMachine) -> ApiFuture<'a, (), Self::Error> {
        let outcome = self.record(ApiCall::CreateVm {
            name: machine.name.clone(),
        });
        Box::pin(async move { outcome })
    }

    fn list_vms(&self, client_id: u64) -> ApiFuture<'_, Vec<VmSummary>, Self::Error> {
        let outcome = self.record(ApiCall::ListVms { client_id }).and_then(|()| {
            next_response(&mut self.script().listings)
                .unwrap_or_else(|| Ok(Vec::new()))
                .map_err(|message| ScriptedApiError {
                    operation: ApiOperation::ListVms,
                    message,
                })
        });
        Box::pin(async move { outcome })
    }

    fn vm_detail<'a>(&'a self, vm_id: &'a VmId) -> ApiFuture<'a, VmDetail, Self::Error> {
        let outcome = self
            .record(ApiCall::VmDetail {
                vm_id: vm_id.clone(),
            })
            .and_then(|()| {
                next_response(&mut self.script().details)
                    .unwrap_or_else(|| Err(format!("no detail scripted for {vm_id}")))
                    .map_err(|message| ScriptedApiError {
                        operation: ApiOperation::VmDetail,
                        message,
                    })
            });
        Box::pin(async move { outcome })
    }

    fn power_off<'a>(&'a self, vm_id: &'a VmId) -> ApiFuture<'a, (), Self::Error> {
        let outcome = self.record(ApiCall::PowerOff {
            vm_id: vm_id.clone(),
        });
        Box::pin(async move { outcome })
    }

    fn delete_vm<'a>(
        &'a self,
        vm_id: &'a VmId,
        check_token: &'a MoRef,
    ) -> ApiFuture<'a, (), Self::Error> {
        let outcome = self.record(ApiCall::DeleteVm {
            vm_id: vm_id.clone(),
            check_token: check_token.clone(),
        });
        Box::pin(async move { outcome })
    }

    fn add_disk<'a>(
        &'a self,
        vm_id: &'a VmId,
        disk: &'a DiskSpec,
    ) -> ApiFuture<'a, (), Self::Error> {
        let outcome = self.record(ApiCall::AddDisk {
            vm_id: vm_id.clone(),
            disk: disk.clone(),
        });
        Box::pin(async move { outcome })
    }
}

impl ObjectStorageApi for ScriptedApi {
    fn create_bucket<'a>(&'a self, request: &'a BucketRequest) -> ApiFuture<'a, (), Self::Error> {
        let outcome = self.record(ApiCall::CreateBucket {
            bucket_name: request.bucket_name.clone(),
        });
        Box::pin(async move { outcome })
    }

    fn list_bucket_names(&self, tenant_id: u64) -> ApiFuture<'_, Vec<String>, Self::Error> {
        let outcome = self.record(ApiCall::ListBuckets { tenant_id }).and_then(|()| {
            next_response(&mut self.script().bucket_listings)
                .unwrap_or_else(|| Ok(Vec::new()))
                .map_err(|message| ScriptedApiError {
                    operation: ApiOperation::ListBuckets,
                    message,
                })
        });
        Box::pin(async move { outcome })
    }

    fn delete_bucket<'a>(&'a self, request: &'a BucketRequest) -> ApiFuture<'a, (), Self::Error> {
        let outcome = self.record(ApiCall::DeleteBucket {
            bucket_name: request.bucket_name.clone(),
        });
        Box::pin(async move { outcome })
    }
}

/// Builds a listing entry.
#[must_use]
pub fn summary(id: &str, name: &str) -> VmSummary {
    VmSummary {
        id: VmId::new(id),
        name: name.to_owned(),
        hosting_location: "Christchurch".to_owned(),
    }
}

/// Builds a detail snapshot whose specification carries `mo_ref` and one
/// 100 GB `vStorageT1` disk per handle in `disks`, in order.
#[must_use]
pub fn detail_with_disks(id: &str, mo_ref: &str, disks: &[&str]) -> VmDetail {
    VmDetail {
        id: VmId::new(id),
        client_id: 123,
        name: format!("vm-{id}"),
        guest_os: None,
        hosting_location: "Christchurch".to_owned(),
        mounted_iso: None,
        specification: Specification {
            health_state: "Ok".to_owned(),
            power_state: "PoweredOn".to_owned(),
            cores: 1,
            sockets: 1,
            memory_gb: 4,
            mo_ref: MoRef::new(mo_ref),
            virtual_disks: disks
                .iter()
                .map(|handle| VirtualDisk {
                    mo_ref: MoRef::new(*handle),
                    capacity: 100,
                    tier: "vStorageT1".to_owned(),
                    name: String::new(),
                    vmfs: String::new(),
                    slot_info: String::new(),
                    capacity_description: "100 GB".to_owned(),
                })
                .collect(),
            network_devices: Vec::new(),
            hosting_location_id: "vcchcres".to_owned(),
            backup_type: "vBackupNone".to_owned(),
        },
    }
}
