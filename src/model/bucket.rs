//! Object-storage bucket requests.

use serde::Serialize;

use super::{ValidationError, require_positive, require_text};

/// Desired state of an object-storage bucket.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BucketRequest {
    /// Tenant owning the bucket.
    pub tenant_id: u64,
    /// Canonical object-storage user the bucket belongs to.
    pub canonical_user_id: String,
    /// Bucket name, unique within the tenant.
    pub bucket_name: String,
    /// Whether object lock is enabled at creation.
    pub object_lock: bool,
}

impl BucketRequest {
    /// Builds a bucket request, trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the tenant id is zero or a name is blank.
    pub fn new(
        tenant_id: u64,
        canonical_user_id: impl Into<String>,
        bucket_name: impl Into<String>,
        object_lock: bool,
    ) -> Result<Self, ValidationError> {
        let request = Self {
            tenant_id,
            canonical_user_id: canonical_user_id.into().trim().to_owned(),
            bucket_name: bucket_name.into().trim().to_owned(),
            object_lock,
        };
        request.validate()?;
        Ok(request)
    }

    /// Checks the required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a required field is unusable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive(self.tenant_id, "tenant_id")?;
        require_text(&self.canonical_user_id, "canonical_user_id")?;
        require_text(&self.bucket_name, "bucket_name")
    }
}
