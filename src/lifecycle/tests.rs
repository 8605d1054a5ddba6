//! Unit tests for the lifecycle orchestrator.

use std::time::Duration;

use rstest::{fixture, rstest};
use tokio::time::{Instant, sleep};

use super::*;
use crate::test_support::{
    ApiCall, ApiOperation, ScriptedApi, detail_with_disks, summary,
};

const SETTLE: Duration = Duration::from_secs(10);

#[fixture]
fn timings() -> LifecycleTimings {
    LifecycleTimings::new(
        Duration::from_secs(5),
        Duration::from_secs(120),
        Duration::from_secs(120),
        Duration::from_secs(60),
        SETTLE,
    )
    .unwrap_or_else(|err| panic!("valid timings: {err}"))
}

#[fixture]
fn machine() -> VirtualMachine {
    VirtualMachine::builder()
        .client_id(123)
        .name("test-vm-2")
        .template(Some("template-123".to_owned()))
        .guest_os_id("os-123")
        .cores(4)
        .memory_size(8)
        .operating_system_disk_storage_profile("vStorageT1")
        .hosting_location("vcchcres", "Christchurch", "net-1")
        .backup_type("vBackupNone")
        .build()
        .unwrap_or_else(|err| panic!("valid machine: {err}"))
}

fn orchestrator(api: &ScriptedApi, timings: LifecycleTimings) -> LifecycleOrchestrator<ScriptedApi> {
    LifecycleOrchestrator::new(api.clone(), timings)
}

#[test]
fn zero_timings_are_rejected() {
    let err = LifecycleTimings::new(
        Duration::ZERO,
        Duration::from_secs(1),
        Duration::from_secs(1),
        Duration::from_secs(1),
        SETTLE,
    )
    .expect_err("zero interval");
    assert_eq!(err, PollSettingsError::ZeroInterval);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn provision_returns_identifier_after_two_polls(
    timings: LifecycleTimings,
    mut machine: VirtualMachine,
) {
    let api = ScriptedApi::new();
    api.push_listing(vec![summary("12345", "test-vm-1")]);
    api.push_listing(vec![
        summary("12345", "test-vm-1"),
        summary("12346", "test-vm-2"),
    ]);
    let lifecycle = orchestrator(&api, timings);

    let vm_id = lifecycle
        .provision(&mut machine)
        .await
        .unwrap_or_else(|err| panic!("provision: {err}"));

    assert_eq!(vm_id.as_str(), "12346");
    assert_eq!(machine.identifier(), Some(&vm_id));
    assert_eq!(api.count(ApiOperation::ListVms), 2);
    assert_eq!(lifecycle.state_of(&vm_id), Some(LifecycleState::Resolved));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn provision_survives_a_failed_listing(timings: LifecycleTimings, mut machine: VirtualMachine) {
    let api = ScriptedApi::new();
    api.push_listing(Vec::new());
    api.push_listing_failure("502 Bad Gateway");
    api.push_listing(vec![summary("12346", "test-vm-2")]);
    let lifecycle = orchestrator(&api, timings);

    let vm_id = lifecycle
        .provision(&mut machine)
        .await
        .unwrap_or_else(|err| panic!("provision: {err}"));

    assert_eq!(vm_id.as_str(), "12346");
    assert_eq!(api.count(ApiOperation::ListVms), 3);
    assert_eq!(lifecycle.state_of(&vm_id), Some(LifecycleState::Resolved));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn invalid_machine_is_rejected_before_any_call(
    timings: LifecycleTimings,
    mut machine: VirtualMachine,
) {
    let api = ScriptedApi::new();
    machine.guest_os_id = "  ".to_owned();

    let err = orchestrator(&api, timings)
        .provision(&mut machine)
        .await
        .expect_err("invalid machine");

    assert_eq!(
        err,
        LifecycleError::Validation(ValidationError::MissingField("guest_os_id".to_owned()))
    );
    assert!(api.calls().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn rejected_submission_is_not_polled(timings: LifecycleTimings, mut machine: VirtualMachine) {
    let api = ScriptedApi::new();
    api.fail_on(ApiOperation::CreateVm, "400 Missing required fields");

    let err = orchestrator(&api, timings)
        .provision(&mut machine)
        .await
        .expect_err("submission rejected");

    assert_eq!(err.step(), Some(LifecycleStep::Submit));
    assert_eq!(api.count(ApiOperation::ListVms), 0);
    assert_eq!(machine.identifier(), None);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn provision_times_out_when_name_never_appears(
    timings: LifecycleTimings,
    mut machine: VirtualMachine,
) {
    let api = ScriptedApi::new();
    api.push_listing(vec![summary("12345", "test-vm-1")]);

    let err = orchestrator(&api, timings)
        .provision(&mut machine)
        .await
        .expect_err("timeout");

    assert!(err.is_timeout());
    assert_eq!(err.step(), Some(LifecycleStep::Poll));
    assert!(err.to_string().starts_with("poll failed for virtual machine `test-vm-2`"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn identified_machine_cannot_be_provisioned_again(
    timings: LifecycleTimings,
    mut machine: VirtualMachine,
) {
    let api = ScriptedApi::new();
    machine
        .assign_identifier(VmId::new("12346"))
        .unwrap_or_else(|err| panic!("assign: {err}"));

    let err = orchestrator(&api, timings)
        .provision(&mut machine)
        .await
        .expect_err("already identified");

    assert!(matches!(
        err,
        LifecycleError::Validation(ValidationError::AlreadyIdentified { .. })
    ));
    assert!(api.calls().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn add_disk_returns_the_new_handle(timings: LifecycleTimings) {
    let api = ScriptedApi::new();
    api.push_detail(detail_with_disks("12345", "vm-000", &["disk-100", "disk-101"]));
    api.push_detail(detail_with_disks(
        "12345",
        "vm-000",
        &["disk-100", "disk-101", "disk-102"],
    ));
    let disk = DiskSpec::new(500, "vStorageT1").unwrap_or_else(|err| panic!("disk: {err}"));

    let mo_ref = orchestrator(&api, timings)
        .add_disk(&VmId::new("12345"), &disk)
        .await
        .unwrap_or_else(|err| panic!("add disk: {err}"));

    assert_eq!(mo_ref.as_str(), "disk-102");
    assert!(api.calls().contains(&ApiCall::AddDisk {
        vm_id: VmId::new("12345"),
        disk,
    }));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn concurrent_disk_additions_on_one_machine_are_serialized(timings: LifecycleTimings) {
    let api = ScriptedApi::new();
    let scripted: [&[&str]; 4] = [
        &["disk-100"],
        &["disk-100", "disk-101"],
        &["disk-100", "disk-101"],
        &["disk-100", "disk-101", "disk-102"],
    ];
    for disks in scripted {
        api.push_detail(detail_with_disks("12345", "vm-000", disks));
    }
    let lifecycle = orchestrator(&api, timings).with_ambiguity(AmbiguityPolicy::Reject);
    let vm_id = VmId::new("12345");
    let first = DiskSpec::new(100, "vStorageT1").unwrap_or_else(|err| panic!("disk: {err}"));
    let second = DiskSpec::new(200, "vStorageT2").unwrap_or_else(|err| panic!("disk: {err}"));

    let (first_outcome, second_outcome) = tokio::join!(
        lifecycle.add_disk(&vm_id, &first),
        lifecycle.add_disk(&vm_id, &second),
    );

    assert_eq!(
        first_outcome.unwrap_or_else(|err| panic!("first disk: {err}")),
        MoRef::new("disk-101")
    );
    assert_eq!(
        second_outcome.unwrap_or_else(|err| panic!("second disk: {err}")),
        MoRef::new("disk-102")
    );
    let operations: Vec<ApiOperation> = api.calls().iter().map(ApiCall::operation).collect();
    assert_eq!(
        operations,
        vec![
            ApiOperation::VmDetail,
            ApiOperation::AddDisk,
            ApiOperation::VmDetail,
            ApiOperation::VmDetail,
            ApiOperation::AddDisk,
            ApiOperation::VmDetail,
        ]
    );
    assert!(lifecycle.locks.is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn decommission_powers_off_before_deleting_with_captured_token(timings: LifecycleTimings) {
    let api = ScriptedApi::new();
    api.push_detail(detail_with_disks("7452", "vm-000", &[]));
    let lifecycle = orchestrator(&api, timings);
    let vm_id = VmId::new("7452");
    let started = Instant::now();

    lifecycle
        .decommission(&vm_id)
        .await
        .unwrap_or_else(|err| panic!("decommission: {err}"));

    assert_eq!(
        api.calls(),
        vec![
            ApiCall::VmDetail {
                vm_id: vm_id.clone()
            },
            ApiCall::PowerOff {
                vm_id: vm_id.clone()
            },
            ApiCall::DeleteVm {
                vm_id: vm_id.clone(),
                check_token: MoRef::new("vm-000"),
            },
        ]
    );
    assert_eq!(started.elapsed(), SETTLE);
    assert_eq!(lifecycle.state_of(&vm_id), Some(LifecycleState::Deleted));

    let again = lifecycle
        .decommission(&vm_id)
        .await
        .expect_err("already deleted");
    assert!(matches!(
        again,
        LifecycleError::InvalidState {
            state: LifecycleState::Deleted,
            ..
        }
    ));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn missing_check_token_aborts_before_power_off(timings: LifecycleTimings) {
    let api = ScriptedApi::new();
    api.push_detail(detail_with_disks("7452", "", &[]));

    let err = orchestrator(&api, timings)
        .decommission(&VmId::new("7452"))
        .await
        .expect_err("no moRef");

    assert!(matches!(err, LifecycleError::MissingCheckToken { .. }));
    assert_eq!(api.count(ApiOperation::PowerOff), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn power_off_failure_skips_delete_and_marks_failed(timings: LifecycleTimings) {
    let api = ScriptedApi::new();
    api.push_detail(detail_with_disks("7452", "vm-000", &[]));
    api.fail_on(ApiOperation::PowerOff, "500 Internal Server Error");
    let lifecycle = orchestrator(&api, timings);
    let vm_id = VmId::new("7452");

    let err = lifecycle
        .decommission(&vm_id)
        .await
        .expect_err("power-off fails");

    assert_eq!(err.step(), Some(LifecycleStep::PowerOff));
    assert!(err.to_string().starts_with("power-off failed for virtual machine 7452"));
    assert_eq!(api.count(ApiOperation::DeleteVm), 0);
    assert_eq!(lifecycle.state_of(&vm_id), Some(LifecycleState::Failed));
    assert!(lifecycle.locks.is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_during_settle_skips_delete(timings: LifecycleTimings) {
    let api = ScriptedApi::new();
    api.push_detail(detail_with_disks("7452", "vm-000", &[]));
    let lifecycle = orchestrator(&api, timings);
    let cancel = lifecycle.cancellation_token().clone();
    let vm_id = VmId::new("7452");

    let (outcome, ()) = tokio::join!(lifecycle.decommission(&vm_id), async {
        sleep(Duration::from_secs(3)).await;
        cancel.cancel();
    });

    let err = outcome.expect_err("cancelled");
    assert_eq!(
        err,
        LifecycleError::Cancelled {
            step: LifecycleStep::Settle,
            target: "virtual machine 7452".to_owned(),
        }
    );
    assert_eq!(api.count(ApiOperation::DeleteVm), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn additional_disk_is_read_back(timings: LifecycleTimings) {
    let api = ScriptedApi::new();
    api.push_detail(detail_with_disks("12345", "vm-000", &["disk-100"]));
    let lifecycle = orchestrator(&api, timings);
    let vm_id = VmId::new("12345");

    let disk = lifecycle
        .additional_disk(&vm_id, &MoRef::new("disk-100"))
        .await
        .unwrap_or_else(|err| panic!("read disk: {err}"));
    assert_eq!(disk.capacity, 100);

    let err = lifecycle
        .additional_disk(&vm_id, &MoRef::new("disk-404"))
        .await
        .expect_err("unknown disk");
    assert!(matches!(err, LifecycleError::DiskNotFound { .. }));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn bucket_lifecycle_round_trip(timings: LifecycleTimings) {
    let api = ScriptedApi::new();
    api.push_bucket_listing(vec!["backups".to_owned()]);
    let lifecycle = orchestrator(&api, timings);
    let request =
        BucketRequest::new(7, "user-1", "backups", true).unwrap_or_else(|err| panic!("{err}"));

    let name = lifecycle
        .provision_bucket(&request)
        .await
        .unwrap_or_else(|err| panic!("provision bucket: {err}"));
    assert_eq!(name, "backups");

    lifecycle
        .decommission_bucket(&request)
        .await
        .unwrap_or_else(|err| panic!("delete bucket: {err}"));
    assert_eq!(
        api.calls().last(),
        Some(&ApiCall::DeleteBucket {
            bucket_name: "backups".to_owned()
        })
    );
}
