//! Shared fixtures for lifecycle BDD scenarios.

use std::cell::RefCell;
use std::future::Future;
use std::time::Duration;

use rstest::fixture;
use tokio::runtime::Builder;
use vbridge::test_support::{ScriptedApi, ScriptedApiError};
use vbridge::{
    LifecycleError, LifecycleOrchestrator, LifecycleStep, LifecycleTimings, MoRef, VmId,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LifecycleFailure {
    pub step: Option<LifecycleStep>,
    pub timeout: bool,
    pub message: String,
}

impl From<LifecycleError<ScriptedApiError>> for LifecycleFailure {
    fn from(value: LifecycleError<ScriptedApiError>) -> Self {
        Self {
            step: value.step(),
            timeout: value.is_timeout(),
            message: value.to_string(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LifecycleOutcome {
    Provisioned(VmId),
    DiskAdded(MoRef),
    Decommissioned,
    Failed(LifecycleFailure),
}

#[derive(Debug)]
pub struct LifecycleContext {
    pub api: ScriptedApi,
    pub outcome: RefCell<Option<LifecycleOutcome>>,
}

impl LifecycleContext {
    pub fn orchestrator(&self) -> LifecycleOrchestrator<ScriptedApi> {
        let timings = LifecycleTimings::new(
            Duration::from_secs(5),
            Duration::from_secs(120),
            Duration::from_secs(120),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
        .unwrap_or_else(|err| panic!("lifecycle timings should be valid: {err}"));
        LifecycleOrchestrator::new(self.api.clone(), timings)
    }

    pub fn record(&self, outcome: LifecycleOutcome) {
        self.outcome.replace(Some(outcome));
    }

    pub fn outcome(&self) -> Option<LifecycleOutcome> {
        self.outcome.borrow().clone()
    }
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    LifecycleContext {
        api: ScriptedApi::new(),
        outcome: RefCell::new(None),
    }
}

/// Runs a future on a current-thread runtime whose clock auto-advances, so
/// poll windows and the settle delay complete instantly.
pub fn run_paused<F: Future>(future: F) -> F::Output {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap_or_else(|err| panic!("tokio runtime should build: {err}"))
        .block_on(future)
}
