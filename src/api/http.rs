//! HTTP implementation of the provider contract.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::model::wire::{WireVmDetail, WireVmSummary};
use crate::model::{BucketRequest, DiskSpec, MoRef, VirtualMachine, VmDetail, VmId, VmSummary};
use crate::transport::{Transport, TransportError};

use super::payload::{
    AddDiskPayload, CreateBucketPayload, CreateVmPayload, DeleteVmPayload, ObjectStorageDetail,
    PowerOperationPayload,
};
use super::{ApiFuture, ObjectStorageApi, VirtualMachineApi};

const CREATE_VM_ENDPOINT: &str = "api/Provisioning/VirtualMachine";
const POWER_OPERATION_ENDPOINT: &str = "api/virtualresource/poweroperation";
const DELETE_VM_ENDPOINT: &str = "api/virtualresource/delete";
const ADD_DISK_ENDPOINT: &str = "api/virtualresource/AddDisk";
const POWER_OFF: &str = "off";

/// Characters escaped in a caller-supplied path segment, `/` included.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Errors raised by [`HttpApi`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    /// Raised when the exchange itself fails or is rejected.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Raised when a response body does not match the expected shape.
    #[error("unexpected response from {endpoint}: {message}")]
    Decode {
        /// Endpoint whose response could not be decoded.
        endpoint: String,
        /// Decoder or normalization error text.
        message: String,
    },
}

impl ClientError {
    /// Returns the remote status when the provider rejected the call.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(err) => err.status(),
            Self::Decode { .. } => None,
        }
    }
}

/// Provider client speaking the JSON REST contract over [`Transport`].
#[derive(Clone, Debug)]
pub struct HttpApi {
    transport: Transport,
}

impl HttpApi {
    /// Wraps a transport.
    #[must_use]
    pub const fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Builds a client for the given endpoint and credentials.
    #[must_use]
    pub fn connect(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        user_email: impl Into<String>,
    ) -> Self {
        Self::new(Transport::new(base_url, api_key, user_email))
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|err| ClientError::Decode {
        endpoint: endpoint.to_owned(),
        message: err.to_string(),
    })
}

fn listing_endpoint(client_id: u64) -> String {
    format!("api/client/virtualresources/{client_id}")
}

fn segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

fn detail_endpoint(vm_id: &VmId) -> String {
    format!("api/VirtualResource/Detailed/{}", segment(vm_id.as_str()))
}

fn bucket_add_endpoint(request: &BucketRequest) -> String {
    format!(
        "api/ObjectStorage/Tenant/{}/Bucket/{}/add",
        request.tenant_id,
        segment(&request.canonical_user_id)
    )
}

fn bucket_delete_endpoint(request: &BucketRequest) -> String {
    format!(
        "api/ObjectStorage/Tenant/{}/Bucket/{}/{}/delete",
        request.tenant_id,
        segment(&request.canonical_user_id),
        segment(&request.bucket_name)
    )
}

fn object_storage_endpoint(tenant_id: u64) -> String {
    format!("api/ObjectStorage/Detailed/{tenant_id}")
}

impl VirtualMachineApi for HttpApi {
    type Error = ClientError;

    fn create_vm<'a>(&'a self, machine: &'a VirtualMachine) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let payload = CreateVmPayload::from(machine);
            self.transport
                .post(CREATE_VM_ENDPOINT, Some(&payload))
                .await?;
            Ok(())
        })
    }

    fn list_vms(&self, client_id: u64) -> ApiFuture<'_, Vec<VmSummary>, Self::Error> {
        Box::pin(async move {
            let endpoint = listing_endpoint(client_id);
            let body = self.transport.get(&endpoint).await?;
            let entries: Vec<WireVmSummary> = decode(&endpoint, &body)?;
            Ok(entries.into_iter().map(VmSummary::from).collect())
        })
    }

    fn vm_detail<'a>(&'a self, vm_id: &'a VmId) -> ApiFuture<'a, VmDetail, Self::Error> {
        Box::pin(async move {
            let endpoint = detail_endpoint(vm_id);
            let body = self.transport.get(&endpoint).await?;
            let wire: WireVmDetail = decode(&endpoint, &body)?;
            VmDetail::try_from(wire).map_err(|err| ClientError::Decode {
                endpoint,
                message: err.to_string(),
            })
        })
    }

    fn power_off<'a>(&'a self, vm_id: &'a VmId) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let payload = PowerOperationPayload {
                virtual_resource_id: vm_id.to_string(),
                operation: POWER_OFF.to_owned(),
            };
            self.transport
                .post(POWER_OPERATION_ENDPOINT, Some(&payload))
                .await?;
            Ok(())
        })
    }

    fn delete_vm<'a>(
        &'a self,
        vm_id: &'a VmId,
        check_token: &'a MoRef,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let payload = DeleteVmPayload {
                virtual_resource_id: vm_id.to_string(),
                check_token: check_token.to_string(),
            };
            self.transport
                .post(DELETE_VM_ENDPOINT, Some(&payload))
                .await?;
            Ok(())
        })
    }

    fn add_disk<'a>(
        &'a self,
        vm_id: &'a VmId,
        disk: &'a DiskSpec,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let payload = AddDiskPayload {
                virtual_resource_id: vm_id.to_string(),
                tier: disk.storage_profile.clone(),
                size: disk.capacity,
            };
            self.transport
                .post(ADD_DISK_ENDPOINT, Some(&payload))
                .await?;
            Ok(())
        })
    }
}

impl ObjectStorageApi for HttpApi {
    fn create_bucket<'a>(&'a self, request: &'a BucketRequest) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let payload = CreateBucketPayload {
                bucket_name: request.bucket_name.clone(),
                object_lock: request.object_lock,
            };
            self.transport
                .post(&bucket_add_endpoint(request), Some(&payload))
                .await?;
            Ok(())
        })
    }

    fn list_bucket_names(&self, tenant_id: u64) -> ApiFuture<'_, Vec<String>, Self::Error> {
        Box::pin(async move {
            let endpoint = object_storage_endpoint(tenant_id);
            let body = self.transport.get(&endpoint).await?;
            let detail: ObjectStorageDetail = decode(&endpoint, &body)?;
            Ok(detail
                .users
                .into_iter()
                .flat_map(|user| user.buckets)
                .map(|bucket| bucket.bucket_name)
                .collect())
        })
    }

    fn delete_bucket<'a>(&'a self, request: &'a BucketRequest) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.transport
                .post::<()>(&bucket_delete_endpoint(request), None)
                .await?;
            Ok(())
        })
    }
}
