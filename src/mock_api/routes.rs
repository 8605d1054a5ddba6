//! Handlers of the mock provider.

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tracing::debug;

use crate::api::payload::{
    AddDiskPayload, CreateBucketPayload, CreateVmPayload, DeleteVmPayload, ObjectStorageDetail,
    PowerOperationPayload,
};
use crate::model::wire::{WireVmDetail, WireVmSummary};
use crate::transport::CALLER_IDENTITY_HEADER;

use super::store::{MockError, MockStore};

type MockResult<T> = Result<T, MockError>;

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub(super) fn routes() -> Router<MockStore> {
    Router::new()
        .route("/api/Provisioning/VirtualMachine", post(create_vm))
        .route("/api/client/virtualresources/{client_id}", get(list_vms))
        .route("/api/VirtualResource/Detailed/{vm_id}", get(vm_detail))
        .route("/api/virtualresource/poweroperation", post(power_operation))
        .route("/api/virtualresource/delete", post(delete_vm))
        .route("/api/virtualresource/AddDisk", post(add_disk))
        .route(
            "/api/ObjectStorage/Tenant/{tenant_id}/Bucket/{user_id}/add",
            post(create_bucket),
        )
        .route(
            "/api/ObjectStorage/Tenant/{tenant_id}/Bucket/{user_id}/{bucket_name}/delete",
            post(delete_bucket),
        )
        .route("/api/ObjectStorage/Detailed/{tenant_id}", get(object_storage))
}

/// Rejects requests that do not carry the configured credentials.
pub(super) async fn require_caller(
    State(store): State<MockStore>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let headers = req.headers();
    let authorization = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    let caller = headers
        .get(CALLER_IDENTITY_HEADER)
        .and_then(|h| h.to_str().ok());
    if !store.authorizes(authorization, caller) {
        debug!(path = %req.uri().path(), "rejecting unauthenticated request");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

async fn create_vm(
    State(store): State<MockStore>,
    Json(payload): Json<CreateVmPayload>,
) -> MockResult<StatusCode> {
    store.create_vm(&payload)?;
    Ok(StatusCode::OK)
}

async fn list_vms(
    State(store): State<MockStore>,
    Path(client_id): Path<u64>,
) -> Json<Vec<WireVmSummary>> {
    Json(store.list_vms(client_id))
}

async fn vm_detail(
    State(store): State<MockStore>,
    Path(vm_id): Path<String>,
) -> MockResult<Json<WireVmDetail>> {
    Ok(Json(store.vm_detail(&vm_id)?))
}

async fn power_operation(
    State(store): State<MockStore>,
    Json(payload): Json<PowerOperationPayload>,
) -> MockResult<StatusCode> {
    if !payload.operation.eq_ignore_ascii_case("off") {
        return Err(MockError::MissingFields);
    }
    store.power_off(&payload.virtual_resource_id)?;
    Ok(StatusCode::OK)
}

async fn delete_vm(
    State(store): State<MockStore>,
    Json(payload): Json<DeleteVmPayload>,
) -> MockResult<StatusCode> {
    store.delete_vm(&payload.virtual_resource_id, &payload.check_token)?;
    Ok(StatusCode::OK)
}

async fn add_disk(
    State(store): State<MockStore>,
    Json(payload): Json<AddDiskPayload>,
) -> MockResult<StatusCode> {
    store.add_disk(&payload.virtual_resource_id, &payload.tier, payload.size)?;
    Ok(StatusCode::OK)
}

async fn create_bucket(
    State(store): State<MockStore>,
    Path((tenant_id, user_id)): Path<(u64, String)>,
    Json(payload): Json<CreateBucketPayload>,
) -> MockResult<StatusCode> {
    store.create_bucket(tenant_id, &user_id, &payload.bucket_name)?;
    Ok(StatusCode::OK)
}

async fn object_storage(
    State(store): State<MockStore>,
    Path(tenant_id): Path<u64>,
) -> Json<ObjectStorageDetail> {
    Json(store.object_storage(tenant_id))
}

async fn delete_bucket(
    State(store): State<MockStore>,
    Path((tenant_id, user_id, bucket_name)): Path<(u64, String, String)>,
) -> MockResult<StatusCode> {
    store.delete_bucket(tenant_id, &user_id, &bucket_name)?;
    Ok(StatusCode::OK)
}
