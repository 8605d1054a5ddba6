//! Per-machine lifecycle state machine.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::model::VmId;

/// Lifecycle of a managed virtual machine.
///
/// `Requested → Resolved → PoweringOff → Deleting → Deleted`, with every
/// non-terminal state able to move to `Failed`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LifecycleState {
    /// Submitted, identifier not yet known.
    Requested,
    /// Identifier confirmed by correlation.
    Resolved,
    /// Power-off issued.
    PoweringOff,
    /// Delete issued.
    Deleting,
    /// Delete accepted.
    Deleted,
    /// A step failed.
    Failed,
}

impl LifecycleState {
    /// Returns `true` for states with no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted | Self::Failed)
    }

    /// Returns `true` when `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal()
            && matches!(
                (self, next),
                (_, Self::Failed)
                    | (Self::Requested, Self::Resolved)
                    | (Self::Resolved, Self::PoweringOff)
                    | (Self::PoweringOff, Self::Deleting)
                    | (Self::Deleting, Self::Deleted)
            )
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Resolved => "resolved",
            Self::PoweringOff => "powering-off",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state change.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct IllegalTransition {
    pub(crate) from: LifecycleState,
}

/// Last known state of each machine this process has touched.
///
/// Machines the book has never seen are assumed `Resolved`: the caller holds
/// an identifier, so correlation succeeded at some point.
#[derive(Clone, Debug, Default)]
pub(crate) struct StateBook {
    states: Arc<Mutex<HashMap<VmId, LifecycleState>>>,
}

impl StateBook {
    fn states(&self) -> MutexGuard<'_, HashMap<VmId, LifecycleState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn get(&self, vm_id: &VmId) -> Option<LifecycleState> {
        self.states().get(vm_id).copied()
    }

    fn current(&self, vm_id: &VmId) -> LifecycleState {
        self.get(vm_id).unwrap_or(LifecycleState::Resolved)
    }

    pub(crate) fn resolved(&self, vm_id: &VmId) {
        info!(
            vm_id = %vm_id,
            from = %LifecycleState::Requested,
            to = %LifecycleState::Resolved,
            "lifecycle transition"
        );
        self.states().insert(vm_id.clone(), LifecycleState::Resolved);
    }

    pub(crate) fn check(
        &self,
        vm_id: &VmId,
        next: LifecycleState,
    ) -> Result<(), IllegalTransition> {
        let from = self.current(vm_id);
        if from.can_transition_to(next) {
            return Ok(());
        }
        Err(IllegalTransition { from })
    }

    pub(crate) fn advance(
        &self,
        vm_id: &VmId,
        next: LifecycleState,
    ) -> Result<(), IllegalTransition> {
        let mut states = self.states();
        let from = states
            .get(vm_id)
            .copied()
            .unwrap_or(LifecycleState::Resolved);
        if !from.can_transition_to(next) {
            return Err(IllegalTransition { from });
        }
        info!(vm_id = %vm_id, %from, to = %next, "lifecycle transition");
        states.insert(vm_id.clone(), next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::LifecycleState;
    use super::StateBook;
    use crate::model::VmId;

    #[rstest]
    #[case(LifecycleState::Requested, LifecycleState::Resolved, true)]
    #[case(LifecycleState::Requested, LifecycleState::Failed, true)]
    #[case(LifecycleState::Resolved, LifecycleState::PoweringOff, true)]
    #[case(LifecycleState::PoweringOff, LifecycleState::Deleting, true)]
    #[case(LifecycleState::Deleting, LifecycleState::Deleted, true)]
    #[case(LifecycleState::Deleting, LifecycleState::Failed, true)]
    #[case(LifecycleState::Resolved, LifecycleState::Deleting, false)]
    #[case(LifecycleState::Requested, LifecycleState::PoweringOff, false)]
    #[case(LifecycleState::Deleted, LifecycleState::Failed, false)]
    #[case(LifecycleState::Failed, LifecycleState::Resolved, false)]
    fn transitions_follow_the_lifecycle(
        #[case] from: LifecycleState,
        #[case] to: LifecycleState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn unknown_machines_start_resolved() {
        let book = StateBook::default();
        let vm_id = VmId::new("7452");
        assert!(book.check(&vm_id, LifecycleState::PoweringOff).is_ok());
        assert!(book.advance(&vm_id, LifecycleState::Deleting).is_err());
        assert_eq!(book.get(&vm_id), None);
    }

    #[test]
    fn terminal_states_reject_further_changes() {
        let book = StateBook::default();
        let vm_id = VmId::new("7452");
        for next in [
            LifecycleState::PoweringOff,
            LifecycleState::Deleting,
            LifecycleState::Deleted,
        ] {
            assert!(book.advance(&vm_id, next).is_ok());
        }
        assert!(LifecycleState::Deleted.is_terminal());
        assert_eq!(
            book.check(&vm_id, LifecycleState::PoweringOff)
                .map_err(|err| err.from),
            Err(LifecycleState::Deleted)
        );
    }
}
