//! Core library for the vbridge virtual machine provisioning engine.
//!
//! The provider's mutating endpoints only acknowledge acceptance and never
//! return a durable identifier. This crate recovers identifiers by polling
//! listing and detail reads (correlation) and drives the multi-step machine,
//! disk and bucket lifecycles on top of that.

pub mod api;
pub mod config;
pub mod correlation;
pub mod lifecycle;
pub mod manifest;
pub mod mock_api;
pub mod model;
pub mod poll;
pub mod telemetry;
pub mod test_support;
pub mod transport;

pub use api::{ClientError, HttpApi, ObjectStorageApi, VirtualMachineApi};
pub use config::{ConfigError, ProviderConfig};
pub use correlation::{AmbiguityPolicy, CorrelationError, CorrelationPolicy};
pub use lifecycle::{
    LifecycleError, LifecycleOrchestrator, LifecycleState, LifecycleStep, LifecycleTimings,
};
pub use manifest::{ManifestError, load_manifest};
pub use model::{
    BucketRequest, DiskSpec, MoRef, ValidationError, VirtualDisk, VirtualMachine, VmDetail, VmId,
};
pub use poll::{PollError, PollSettings};
pub use transport::{Transport, TransportError};
