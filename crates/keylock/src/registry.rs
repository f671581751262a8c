//! Process-wide registry of per-identity lock state

use crate::monitor::Monitor;
use crate::signal::Signal;
use crate::target::{Identity, Liveness, Lockable};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Dead entries are swept once per this many lookups
const SWEEP_INTERVAL: usize = 64;

/// Per-identity lock state
///
/// Colocates the advisory [`Signal`] with the exclusion [`Monitor`] so both
/// are reclaimed together once their target becomes unreachable.
pub struct LockState {
    signal: Signal,
    monitor: Monitor,
}

impl LockState {
    fn new() -> Self {
        Self {
            signal: Signal::new(),
            monitor: Monitor::new(),
        }
    }

    /// The advisory signal for this identity
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// The exclusion monitor for this identity
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

/// Registry slot: lock state plus the liveness probe of its target
struct Slot {
    liveness: Liveness,
    state: Arc<LockState>,
}

impl Slot {
    fn for_target<T: Lockable + ?Sized>(target: &T) -> Self {
        Self {
            liveness: target.watch(),
            state: Arc::new(LockState::new()),
        }
    }
}

/// Weak-keyed, thread-safe map from target identity to lock state
///
/// The registry never holds a strong reference to a target; each slot keeps
/// only a [`Liveness`] probe. Slots whose target has been dropped are swept
/// on a lookup-count trigger, and a slot whose address has been reused by a
/// new allocation is replaced on access.
pub struct Registry {
    slots: DashMap<Identity, Slot>,
    lookups: AtomicUsize,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Get the lock state for a target, creating it if absent
    ///
    /// Creation is race-free: under N concurrent first-time callers for the
    /// same identity exactly one state is created and all callers observe it.
    pub fn get_or_create<T: Lockable + ?Sized>(&self, target: &T) -> Arc<LockState> {
        if self.lookups.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep();
        }

        match self.slots.entry(target.identity()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().liveness.is_live() {
                    Arc::clone(&occupied.get().state)
                } else {
                    // The previous target died and its address was reused
                    let slot = Slot::for_target(target);
                    let state = Arc::clone(&slot.state);
                    occupied.insert(slot);
                    state
                }
            }
            Entry::Vacant(vacant) => {
                let slot = Slot::for_target(target);
                let state = Arc::clone(&slot.state);
                vacant.insert(slot);
                state
            }
        }
    }

    /// Drop all slots whose target is no longer reachable
    pub fn sweep(&self) {
        self.slots.retain(|_, slot| slot.liveness.is_live());
    }

    /// Number of registered identities
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
