//! BDD scenarios for the lifecycle orchestrator.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Provisioning resolves the identifier once the machine is listed"
)]
fn scenario_provision_resolves(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Provisioning times out when the machine never appears"
)]
fn scenario_provision_times_out(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Rejected submissions are not polled"
)]
fn scenario_submission_rejected(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Adding a disk resolves the new handle"
)]
fn scenario_add_disk(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Decommissioning powers off before deleting"
)]
fn scenario_decommission(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Power-off failure prevents deletion"
)]
fn scenario_power_off_failure(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}
