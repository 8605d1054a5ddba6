//! Lifecycle orchestrator: composes provider calls and correlation into
//! identifier-bearing operations.
//!
//! Each operation runs to completion before returning. Suspension happens only
//! in the poll sleeps and the decommission settle wait, both of which race the
//! orchestrator's cancellation token. Failures abort the sequence without
//! compensating action.

mod error;
mod locks;
mod state;

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use error::{LifecycleError, LifecycleStep};
pub use locks::{VmGuard, VmLocks};
pub use state::LifecycleState;

use crate::api::{ObjectStorageApi, VirtualMachineApi};
use crate::correlation::{
    AmbiguityPolicy, CorrelationPolicy, resolve_bucket_by_name, resolve_by_name,
    resolve_new_disk_by_diff,
};
use crate::model::{
    BucketRequest, DiskSpec, MoRef, ValidationError, VirtualDisk, VirtualMachine, VmDetail, VmId,
};
use crate::poll::{PollSettings, PollSettingsError};
use state::StateBook;

/// Poll windows and settle delay used by the orchestrator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LifecycleTimings {
    /// Window for resolving a provisioned machine by name.
    pub provision: PollSettings,
    /// Window for resolving a new disk by diff.
    pub disk: PollSettings,
    /// Window for resolving a new bucket by name.
    pub bucket: PollSettings,
    /// Fixed wait between power-off and delete.
    pub settle_delay: Duration,
}

impl LifecycleTimings {
    /// Builds timings sharing one poll interval.
    ///
    /// # Errors
    ///
    /// Returns [`PollSettingsError`] when the interval or any timeout is zero.
    pub fn new(
        poll_interval: Duration,
        provision_timeout: Duration,
        disk_timeout: Duration,
        bucket_timeout: Duration,
        settle_delay: Duration,
    ) -> Result<Self, PollSettingsError> {
        Ok(Self {
            provision: PollSettings::new(poll_interval, provision_timeout)?,
            disk: PollSettings::new(poll_interval, disk_timeout)?,
            bucket: PollSettings::new(poll_interval, bucket_timeout)?,
            settle_delay,
        })
    }
}

/// Sequences provider calls for provisioning, disk addition and teardown.
///
/// The orchestrator remembers the terminal state of every machine it tore
/// down so later calls for it are refused. That record grows with each
/// decommission, so an orchestrator is meant to live for one command or one
/// bounded run, not for the life of a long-running service. Per-machine
/// gates are pruned as soon as they are released.
#[derive(Debug)]
pub struct LifecycleOrchestrator<A> {
    api: A,
    timings: LifecycleTimings,
    ambiguity: AmbiguityPolicy,
    locks: VmLocks,
    states: StateBook,
    cancel: CancellationToken,
}

impl<A> LifecycleOrchestrator<A> {
    /// Creates an orchestrator with first-match ambiguity handling.
    #[must_use]
    pub fn new(api: A, timings: LifecycleTimings) -> Self {
        Self {
            api,
            timings,
            ambiguity: AmbiguityPolicy::default(),
            locks: VmLocks::default(),
            states: StateBook::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Overrides the ambiguity policy applied by every resolver.
    #[must_use]
    pub const fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels every in-flight operation when fired.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Provider client used by the orchestrator.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Last state recorded for a machine by this orchestrator.
    #[must_use]
    pub fn state_of(&self, vm_id: &VmId) -> Option<LifecycleState> {
        self.states.get(vm_id)
    }

    const fn policy(&self, settings: PollSettings) -> CorrelationPolicy {
        CorrelationPolicy::new(settings, self.ambiguity)
    }

    fn ensure_not_cancelled<E>(
        &self,
        step: LifecycleStep,
        target: &str,
    ) -> Result<(), LifecycleError<E>> {
        if self.cancel.is_cancelled() {
            return Err(LifecycleError::Cancelled {
                step,
                target: target.to_owned(),
            });
        }
        Ok(())
    }

    fn transition<E>(
        &self,
        vm_id: &VmId,
        next: LifecycleState,
        step: LifecycleStep,
    ) -> Result<(), LifecycleError<E>> {
        self.states
            .advance(vm_id, next)
            .map_err(|illegal| LifecycleError::InvalidState {
                vm_id: vm_id.clone(),
                state: illegal.from,
                step,
            })
    }
}

impl<A: VirtualMachineApi> LifecycleOrchestrator<A> {
    /// Submits `machine` and resolves its durable identifier by name.
    ///
    /// On success the identifier is also recorded on `machine`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] before any network call when the
    /// machine is invalid or already identified, a `submit` step error when
    /// the provider rejects the request (no polling follows), and a `poll`
    /// correlation error on timeout or ambiguity.
    pub async fn provision(
        &self,
        machine: &mut VirtualMachine,
    ) -> Result<VmId, LifecycleError<A::Error>> {
        machine.validate()?;
        if let Some(existing) = machine.identifier() {
            return Err(ValidationError::AlreadyIdentified {
                name: machine.name.clone(),
                id: existing.clone(),
            }
            .into());
        }
        let target = format!("virtual machine `{}`", machine.name);
        self.ensure_not_cancelled(LifecycleStep::Submit, &target)?;

        info!(name = %machine.name, client_id = machine.client_id, "submitting virtual machine");
        self.api
            .create_vm(machine)
            .await
            .map_err(|source| LifecycleError::Step {
                step: LifecycleStep::Submit,
                target: target.clone(),
                source,
            })?;

        let policy = self.policy(self.timings.provision);
        let vm_id = match resolve_by_name(
            &self.api,
            &machine.name,
            machine.client_id,
            &policy,
            &self.cancel,
        )
        .await
        {
            Ok(vm_id) => vm_id,
            Err(err) => {
                warn!(name = %machine.name, state = %LifecycleState::Failed, "provision failed");
                return Err(LifecycleError::from_correlation(target, err));
            }
        };

        machine.assign_identifier(vm_id.clone())?;
        self.states.resolved(&vm_id);
        Ok(vm_id)
    }

    /// Adds a disk to `vm_id` and resolves its handle by diffing the
    /// machine's disks before and after the mutation.
    ///
    /// Concurrent calls for the same machine are serialized.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] for an invalid disk,
    /// [`LifecycleError::InvalidState`] for a machine already torn down, a
    /// `submit` or `poll` step error for provider failures and a `poll`
    /// correlation error on timeout or ambiguity.
    pub async fn add_disk(
        &self,
        vm_id: &VmId,
        disk: &DiskSpec,
    ) -> Result<MoRef, LifecycleError<A::Error>> {
        disk.validate()?;
        let _guard = self.locks.acquire(vm_id).await;
        if let Some(state) = self.states.get(vm_id).filter(|state| state.is_terminal()) {
            return Err(LifecycleError::InvalidState {
                vm_id: vm_id.clone(),
                state,
                step: LifecycleStep::Submit,
            });
        }

        let target = format!("disk on virtual machine {vm_id}");
        let policy = self.policy(self.timings.disk);
        info!(
            vm_id = %vm_id,
            capacity = disk.capacity,
            storage_profile = %disk.storage_profile,
            "adding disk"
        );
        resolve_new_disk_by_diff(
            &self.api,
            vm_id,
            || self.api.add_disk(vm_id, disk),
            &policy,
            &self.cancel,
        )
        .await
        .map_err(|err| LifecycleError::from_correlation(target, err))
    }

    /// Powers `vm_id` off, waits the settle delay, then deletes it using the
    /// moRef captured beforehand as the check token.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidState`] when the machine was already
    /// deleted or failed, [`LifecycleError::MissingCheckToken`] when the detail
    /// read has no moRef, a step error naming `inspect`, `power-off` or
    /// `delete` for provider failures and [`LifecycleError::Cancelled`] when
    /// cancelled during the settle wait.
    pub async fn decommission(&self, vm_id: &VmId) -> Result<(), LifecycleError<A::Error>> {
        let _guard = self.locks.acquire(vm_id).await;
        self.states
            .check(vm_id, LifecycleState::PoweringOff)
            .map_err(|illegal| LifecycleError::InvalidState {
                vm_id: vm_id.clone(),
                state: illegal.from,
                step: LifecycleStep::PowerOff,
            })?;

        let outcome = self.decommission_steps(vm_id).await;
        if let Err(err) = &outcome {
            warn!(vm_id = %vm_id, error = %err, "decommission failed");
            if let Err(illegal) = self.states.advance(vm_id, LifecycleState::Failed) {
                warn!(vm_id = %vm_id, state = %illegal.from, "state left unchanged");
            }
        }
        outcome
    }

    async fn decommission_steps(&self, vm_id: &VmId) -> Result<(), LifecycleError<A::Error>> {
        let target = format!("virtual machine {vm_id}");
        let detail = self.inspect(vm_id).await?;
        let check_token = detail.specification.mo_ref;
        if check_token.is_blank() {
            return Err(LifecycleError::MissingCheckToken {
                vm_id: vm_id.clone(),
            });
        }

        self.ensure_not_cancelled(LifecycleStep::PowerOff, &target)?;
        self.transition(vm_id, LifecycleState::PoweringOff, LifecycleStep::PowerOff)?;
        self.api
            .power_off(vm_id)
            .await
            .map_err(|source| LifecycleError::Step {
                step: LifecycleStep::PowerOff,
                target: target.clone(),
                source,
            })?;

        info!(
            vm_id = %vm_id,
            settle_secs = self.timings.settle_delay.as_secs(),
            "waiting for power-off to settle"
        );
        tokio::select! {
            () = self.cancel.cancelled() => {
                return Err(LifecycleError::Cancelled {
                    step: LifecycleStep::Settle,
                    target,
                });
            }
            () = sleep(self.timings.settle_delay) => {}
        }

        self.transition(vm_id, LifecycleState::Deleting, LifecycleStep::Delete)?;
        self.api
            .delete_vm(vm_id, &check_token)
            .await
            .map_err(|source| LifecycleError::Step {
                step: LifecycleStep::Delete,
                target,
                source,
            })?;
        self.transition(vm_id, LifecycleState::Deleted, LifecycleStep::Delete)?;
        Ok(())
    }

    /// Reads the normalized detail of a machine.
    ///
    /// # Errors
    ///
    /// Returns an `inspect` step error when the read fails.
    pub async fn inspect(&self, vm_id: &VmId) -> Result<VmDetail, LifecycleError<A::Error>> {
        self.api
            .vm_detail(vm_id)
            .await
            .map_err(|source| LifecycleError::Step {
                step: LifecycleStep::Inspect,
                target: format!("virtual machine {vm_id}"),
                source,
            })
    }

    /// Reads one disk of a machine from a fresh detail snapshot.
    ///
    /// # Errors
    ///
    /// Returns an `inspect` step error when the read fails and
    /// [`LifecycleError::DiskNotFound`] when the handle is not attached.
    pub async fn additional_disk(
        &self,
        vm_id: &VmId,
        mo_ref: &MoRef,
    ) -> Result<VirtualDisk, LifecycleError<A::Error>> {
        let detail = self.inspect(vm_id).await?;
        detail
            .specification
            .disk(mo_ref)
            .cloned()
            .ok_or_else(|| LifecycleError::DiskNotFound {
                vm_id: vm_id.clone(),
                mo_ref: mo_ref.clone(),
            })
    }
}

impl<A: ObjectStorageApi> LifecycleOrchestrator<A> {
    /// Submits a bucket and resolves it by name.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] for an invalid request, a
    /// `submit` step error when the provider rejects it and a `poll`
    /// correlation error on timeout.
    pub async fn provision_bucket(
        &self,
        request: &BucketRequest,
    ) -> Result<String, LifecycleError<A::Error>> {
        request.validate()?;
        let target = format!("bucket `{}`", request.bucket_name);
        self.ensure_not_cancelled(LifecycleStep::Submit, &target)?;

        info!(bucket = %request.bucket_name, tenant_id = request.tenant_id, "submitting bucket");
        self.api
            .create_bucket(request)
            .await
            .map_err(|source| LifecycleError::Step {
                step: LifecycleStep::Submit,
                target: target.clone(),
                source,
            })?;

        let policy = self.policy(self.timings.bucket);
        resolve_bucket_by_name(
            &self.api,
            request.tenant_id,
            &request.bucket_name,
            &policy,
            &self.cancel,
        )
        .await
        .map_err(|err| LifecycleError::from_correlation(target, err))
    }

    /// Deletes a bucket.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] for an invalid request and a
    /// `delete` step error when the provider rejects it.
    pub async fn decommission_bucket(
        &self,
        request: &BucketRequest,
    ) -> Result<(), LifecycleError<A::Error>> {
        request.validate()?;
        info!(bucket = %request.bucket_name, tenant_id = request.tenant_id, "deleting bucket");
        self.api
            .delete_bucket(request)
            .await
            .map_err(|source| LifecycleError::Step {
                step: LifecycleStep::Delete,
                target: format!("bucket `{}`", request.bucket_name),
                source,
            })
    }
}

#[cfg(test)]
mod tests;
