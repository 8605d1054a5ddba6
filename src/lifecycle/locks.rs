//! Per-machine serialization guard.
//!
//! Operations that diff or tear down a machine hold its gate for their whole
//! duration. Different machines never contend. A gate is dropped from the
//! registry as soon as its last holder releases it with nobody waiting, so the
//! registry only ever holds machines with an operation in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::VmId;

type Gates = HashMap<VmId, Arc<AsyncMutex<()>>>;

fn lock_gates(gates: &Mutex<Gates>) -> MutexGuard<'_, Gates> {
    gates.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of async gates keyed by machine identifier.
#[derive(Clone, Debug, Default)]
pub struct VmLocks {
    gates: Arc<Mutex<Gates>>,
}

/// Exclusive access to one machine, released on drop.
#[derive(Debug)]
pub struct VmGuard {
    vm_id: VmId,
    gates: Arc<Mutex<Gates>>,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for VmGuard {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut gates = lock_gates(&self.gates);
        // Waiters clone the gate under the registry lock, so a count of one
        // means only the registry still refers to it.
        if gates
            .get(&self.vm_id)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&self.vm_id);
        }
    }
}

impl VmLocks {
    /// Waits for exclusive access to `vm_id`.
    pub async fn acquire(&self, vm_id: &VmId) -> VmGuard {
        let gate = Arc::clone(lock_gates(&self.gates).entry(vm_id.clone()).or_default());
        let held = gate.lock_owned().await;
        VmGuard {
            vm_id: vm_id.clone(),
            gates: Arc::clone(&self.gates),
            held: Some(held),
        }
    }

    /// Number of machines with a registered gate.
    #[must_use]
    pub fn len(&self) -> usize {
        lock_gates(&self.gates).len()
    }

    /// Returns `true` when no gate is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock_gates(&self.gates).is_empty()
    }
}
