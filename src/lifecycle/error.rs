//! Errors surfaced by the lifecycle orchestrator.

use std::fmt;

use thiserror::Error;

use crate::correlation::CorrelationError;
use crate::model::{MoRef, ValidationError, VmId};

use super::LifecycleState;

/// Step of an orchestrated operation, named in every failure.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LifecycleStep {
    /// Submitting a mutation.
    Submit,
    /// Polling for the mutation's result.
    Poll,
    /// Reading a machine's detail.
    Inspect,
    /// Issuing a power-off.
    PowerOff,
    /// Waiting for the power-off to settle.
    Settle,
    /// Issuing a delete.
    Delete,
}

impl LifecycleStep {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Poll => "poll",
            Self::Inspect => "inspect",
            Self::PowerOff => "power-off",
            Self::Settle => "settle",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by [`super::LifecycleOrchestrator`] operations.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LifecycleError<E> {
    /// The request was rejected before any network call.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    /// A provider call failed.
    #[error("{step} failed for {target}: {source}")]
    Step {
        /// Step that failed.
        step: LifecycleStep,
        /// Machine, disk or bucket being operated on.
        target: String,
        /// Provider error.
        #[source]
        source: E,
    },
    /// Correlation did not produce an identifier.
    #[error("{step} failed for {target}: {source}")]
    Correlation {
        /// Step that failed.
        step: LifecycleStep,
        /// Machine, disk or bucket being resolved.
        target: String,
        /// Timeout or ambiguity details.
        #[source]
        source: Box<CorrelationError<E>>,
    },
    /// The detail read returned no moRef to use as the delete check token.
    #[error("virtual machine {vm_id} reported no moRef to use as delete check token")]
    MissingCheckToken {
        /// Machine being decommissioned.
        vm_id: VmId,
    },
    /// A requested disk is not attached to the machine.
    #[error("disk {mo_ref} not found on virtual machine {vm_id}")]
    DiskNotFound {
        /// Machine that was read.
        vm_id: VmId,
        /// Requested disk handle.
        mo_ref: MoRef,
    },
    /// The machine's lifecycle state does not allow the step.
    #[error("virtual machine {vm_id} is {state}; cannot {step}")]
    InvalidState {
        /// Machine being operated on.
        vm_id: VmId,
        /// Last recorded state.
        state: LifecycleState,
        /// Step that was refused.
        step: LifecycleStep,
    },
    /// The operation was cancelled.
    #[error("{step} cancelled for {target}")]
    Cancelled {
        /// Step interrupted by cancellation.
        step: LifecycleStep,
        /// Machine, disk or bucket being operated on.
        target: String,
    },
}

impl<E> LifecycleError<E> {
    /// Step that failed, when the failure happened inside a step.
    #[must_use]
    pub const fn step(&self) -> Option<LifecycleStep> {
        match self {
            Self::Step { step, .. }
            | Self::Correlation { step, .. }
            | Self::InvalidState { step, .. }
            | Self::Cancelled { step, .. } => Some(*step),
            Self::MissingCheckToken { .. } => Some(LifecycleStep::Inspect),
            Self::Validation(_) | Self::DiskNotFound { .. } => None,
        }
    }

    /// Returns `true` when correlation ran out of time, so callers can decide
    /// whether to retry with a longer window.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Correlation { source, .. } if matches!(**source, CorrelationError::Timeout { .. })
        )
    }

    pub(crate) fn from_correlation(target: String, err: CorrelationError<E>) -> Self {
        match err {
            CorrelationError::Read(source) => Self::Step {
                step: LifecycleStep::Poll,
                target,
                source,
            },
            CorrelationError::Mutation(source) => Self::Step {
                step: LifecycleStep::Submit,
                target,
                source,
            },
            CorrelationError::Cancelled { .. } => Self::Cancelled {
                step: LifecycleStep::Poll,
                target,
            },
            other @ (CorrelationError::Timeout { .. } | CorrelationError::Ambiguous { .. }) => {
                Self::Correlation {
                    step: LifecycleStep::Poll,
                    target,
                    source: Box::new(other),
                }
            }
        }
    }
}
