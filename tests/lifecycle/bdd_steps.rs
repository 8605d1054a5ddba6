//! BDD step definitions for the lifecycle orchestrator.

use rstest_bdd_macros::{given, then, when};
use vbridge::test_support::{ApiCall, ApiOperation, detail_with_disks, summary};
use vbridge::{DiskSpec, VirtualMachine, VmId};

use super::test_helpers::{LifecycleContext, LifecycleFailure, LifecycleOutcome, run_paused};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn split_handles(disks: &str) -> Vec<&str> {
    disks
        .split(',')
        .map(str::trim)
        .filter(|handle| !handle.is_empty())
        .collect()
}

fn machine(name: &str) -> VirtualMachine {
    VirtualMachine::builder()
        .client_id(123)
        .name(name)
        .template(Some(String::from("template-123")))
        .guest_os_id("os-123")
        .cores(4)
        .memory_size(8)
        .operating_system_disk_storage_profile("vStorageT1")
        .hosting_location("vcchcres", "Christchurch", "net-1")
        .backup_type("vBackupNone")
        .build()
        .unwrap_or_else(|err| panic!("machine fixture should validate: {err}"))
}

fn failure(lifecycle_context: &LifecycleContext) -> Result<LifecycleFailure, StepError> {
    match lifecycle_context.outcome() {
        Some(LifecycleOutcome::Failed(failure)) => Ok(failure),
        other => Err(StepError::Assertion(format!(
            "expected failure outcome, got {other:?}"
        ))),
    }
}

#[given("a provider that lists the new machine on the second poll")]
fn lists_on_second_poll(lifecycle_context: &LifecycleContext) {
    lifecycle_context
        .api
        .push_listing(vec![summary("12345", "test-vm-1")]);
    lifecycle_context.api.push_listing(vec![
        summary("12345", "test-vm-1"),
        summary("12346", "test-vm-2"),
    ]);
}

#[given("a provider that never lists the new machine")]
fn never_lists(lifecycle_context: &LifecycleContext) {
    lifecycle_context
        .api
        .push_listing(vec![summary("12345", "test-vm-1")]);
}

#[given("a provider that rejects submissions")]
fn rejects_submissions(lifecycle_context: &LifecycleContext) {
    lifecycle_context
        .api
        .fail_on(ApiOperation::CreateVm, "400 Missing required fields");
}

#[given("machine \"{vm_id}\" with disks \"{disks}\"")]
fn machine_with_disks(lifecycle_context: &LifecycleContext, vm_id: String, disks: String) {
    lifecycle_context
        .api
        .push_detail(detail_with_disks(&vm_id, "vm-000", &split_handles(&disks)));
}

#[given("machine \"{vm_id}\" later reports disks \"{disks}\"")]
fn later_reports_disks(lifecycle_context: &LifecycleContext, vm_id: String, disks: String) {
    lifecycle_context
        .api
        .push_detail(detail_with_disks(&vm_id, "vm-000", &split_handles(&disks)));
}

#[given("power-off fails")]
fn power_off_fails(lifecycle_context: &LifecycleContext) {
    lifecycle_context
        .api
        .fail_on(ApiOperation::PowerOff, "500 Internal Server Error");
}

#[when("I provision the machine \"{name}\"")]
fn provision(lifecycle_context: &LifecycleContext, name: String) {
    let orchestrator = lifecycle_context.orchestrator();
    let mut vm = machine(&name);
    let outcome = match run_paused(orchestrator.provision(&mut vm)) {
        Ok(vm_id) => LifecycleOutcome::Provisioned(vm_id),
        Err(err) => LifecycleOutcome::Failed(err.into()),
    };
    lifecycle_context.record(outcome);
}

#[when("I add a \"{capacity}\" GB \"{profile}\" disk to machine \"{vm_id}\"")]
fn add_disk(lifecycle_context: &LifecycleContext, capacity: u32, profile: String, vm_id: String) {
    let orchestrator = lifecycle_context.orchestrator();
    let disk = DiskSpec::new(capacity, profile)
        .unwrap_or_else(|err| panic!("disk fixture should validate: {err}"));
    let outcome = match run_paused(orchestrator.add_disk(&VmId::new(vm_id), &disk)) {
        Ok(mo_ref) => LifecycleOutcome::DiskAdded(mo_ref),
        Err(err) => LifecycleOutcome::Failed(err.into()),
    };
    lifecycle_context.record(outcome);
}

#[when("I decommission machine \"{vm_id}\"")]
fn decommission(lifecycle_context: &LifecycleContext, vm_id: String) {
    let orchestrator = lifecycle_context.orchestrator();
    let outcome = match run_paused(orchestrator.decommission(&VmId::new(vm_id))) {
        Ok(()) => LifecycleOutcome::Decommissioned,
        Err(err) => LifecycleOutcome::Failed(err.into()),
    };
    lifecycle_context.record(outcome);
}

#[then("the lifecycle succeeds")]
fn lifecycle_succeeds(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match lifecycle_context.outcome() {
        Some(LifecycleOutcome::Failed(failure)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {}",
            failure.message
        ))),
        Some(_) => Ok(()),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the resolved identifier is \"{expected}\"")]
fn resolved_identifier(
    lifecycle_context: &LifecycleContext,
    expected: String,
) -> Result<(), StepError> {
    match lifecycle_context.outcome() {
        Some(LifecycleOutcome::Provisioned(vm_id)) if vm_id.as_str() == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected identifier {expected}, got {other:?}"
        ))),
    }
}

#[then("the new disk handle is \"{expected}\"")]
fn new_disk_handle(lifecycle_context: &LifecycleContext, expected: String) -> Result<(), StepError> {
    match lifecycle_context.outcome() {
        Some(LifecycleOutcome::DiskAdded(mo_ref)) if mo_ref.as_str() == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected disk {expected}, got {other:?}"
        ))),
    }
}

#[then("the listing was read \"{count}\" times")]
fn listing_reads(lifecycle_context: &LifecycleContext, count: usize) -> Result<(), StepError> {
    let actual = lifecycle_context.api.count(ApiOperation::ListVms);
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} listing reads, got {actual}"
        )))
    }
}

#[then("the lifecycle fails at step \"{step}\"")]
fn fails_at_step(lifecycle_context: &LifecycleContext, step: String) -> Result<(), StepError> {
    let failure = failure(lifecycle_context)?;
    let actual = failure.step.map(|value| value.to_string());
    if actual.as_deref() == Some(step.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected failure at {step}, got {actual:?}: {}",
            failure.message
        )))
    }
}

#[then("the failure is a timeout")]
fn failure_is_timeout(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let failure = failure(lifecycle_context)?;
    if failure.timeout {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected timeout, got: {}",
            failure.message
        )))
    }
}

#[then("the provider saw power-off before delete with check token \"{token}\"")]
fn power_off_before_delete(
    lifecycle_context: &LifecycleContext,
    token: String,
) -> Result<(), StepError> {
    let calls = lifecycle_context.api.calls();
    let power_off = calls
        .iter()
        .position(|call| matches!(call, ApiCall::PowerOff { .. }));
    let delete = calls.iter().position(|call| {
        matches!(call, ApiCall::DeleteVm { check_token, .. } if check_token.as_str() == token)
    });
    match (power_off, delete) {
        (Some(off), Some(del)) if off < del => Ok(()),
        _ => Err(StepError::Assertion(format!(
            "expected power-off then delete with {token}, got {calls:?}"
        ))),
    }
}

#[then("no delete was issued")]
fn no_delete(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let deletes = lifecycle_context.api.count(ApiOperation::DeleteVm);
    if deletes == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no delete calls, got {deletes}"
        )))
    }
}
