//! Reentrant per-identity exclusion monitor

use crossbeam::atomic::AtomicCell;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

/// Errors that can occur when releasing a monitor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorError {
    /// Exit called by a thread that does not own the monitor
    #[error("exit called by non-owner thread {0:?}")]
    NotOwner(ThreadId),
}

/// Authoritative ownership state, guarded by the monitor's mutex
struct MonitorState {
    owner: Option<ThreadId>,
    waiters: usize,
}

/// Reentrant mutual-exclusion monitor
///
/// [`enter`](Monitor::enter) blocks without timeout until no other thread
/// owns the monitor, then records the calling thread as owner; a thread that
/// already owns it increments the reentrancy depth instead of blocking.
/// [`exit`](Monitor::exit) decrements the depth and, at zero, releases
/// ownership and wakes exactly one waiting thread. All memory effects of the
/// owning thread before `exit` are visible to the next thread that `enter`s.
pub struct Monitor {
    /// Owner mirror for lock-free reads; transitions happen under `state`
    owner: AtomicCell<Option<ThreadId>>,

    /// Reentrancy depth; mutated only by the owning thread
    depth: AtomicUsize,

    state: Mutex<MonitorState>,
    cond: Condvar,
}

impl Monitor {
    /// Create a new, unowned monitor
    pub fn new() -> Self {
        Self {
            owner: AtomicCell::new(None),
            depth: AtomicUsize::new(0),
            state: Mutex::new(MonitorState {
                owner: None,
                waiters: 0,
            }),
            cond: Condvar::new(),
        }
    }

    /// Acquire the monitor, blocking until no other thread owns it
    ///
    /// Reentrant: if the calling thread already owns the monitor the depth
    /// is incremented and the call returns immediately.
    pub fn enter(&self) {
        let me = thread::current().id();

        // Only the owning thread can observe itself in the mirror, so this
        // read cannot race with another thread claiming ownership.
        if self.owner.load() == Some(me) {
            self.depth.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut state = self.state.lock();
        if state.owner.is_some() {
            state.waiters += 1;
            while state.owner.is_some() {
                self.cond.wait(&mut state);
            }
            state.waiters -= 1;
        }
        state.owner = Some(me);
        self.owner.store(Some(me));
        self.depth.store(1, Ordering::Relaxed);
    }

    /// Release one level of ownership
    ///
    /// When the depth reaches zero, ownership is cleared and exactly one
    /// thread waiting in [`enter`](Monitor::enter) is woken. Calling `exit`
    /// from a thread that does not own the monitor is a programming error
    /// and fails with [`MonitorError::NotOwner`].
    pub fn exit(&self) -> Result<(), MonitorError> {
        let me = thread::current().id();
        if self.owner.load() != Some(me) {
            return Err(MonitorError::NotOwner(me));
        }

        if self.depth.fetch_sub(1, Ordering::Relaxed) > 1 {
            // Still held reentrantly
            return Ok(());
        }

        {
            let mut state = self.state.lock();
            state.owner = None;
            self.owner.store(None);
        }
        self.cond.notify_one();
        Ok(())
    }

    /// Current owner, if any
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner.load()
    }

    /// Current reentrancy depth
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Check whether the calling thread owns the monitor
    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner.load() == Some(thread::current().id())
    }

    /// Number of threads currently blocked in `enter`
    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiters
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_monitor_uncontended_enter_exit() {
        let monitor = Monitor::new();

        monitor.enter();
        assert!(monitor.is_held_by_current_thread());
        assert_eq!(monitor.depth(), 1);

        monitor.exit().unwrap();
        assert!(!monitor.is_held_by_current_thread());
        assert_eq!(monitor.owner(), None);
    }

    #[test]
    fn test_monitor_reentrant_depth() {
        let monitor = Monitor::new();

        monitor.enter();
        monitor.enter();
        monitor.enter();
        assert_eq!(monitor.depth(), 3);

        monitor.exit().unwrap();
        assert_eq!(monitor.depth(), 2);
        assert!(monitor.is_held_by_current_thread());

        monitor.exit().unwrap();
        monitor.exit().unwrap();
        assert_eq!(monitor.owner(), None);
    }

    #[test]
    fn test_monitor_exit_without_enter() {
        let monitor = Monitor::new();

        let result = monitor.exit();
        assert_eq!(
            result.unwrap_err(),
            MonitorError::NotOwner(thread::current().id())
        );
    }

    #[test]
    fn test_monitor_exit_by_non_owner() {
        let monitor = Arc::new(Monitor::new());
        monitor.enter();

        let other = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.exit())
        };

        let result = other.join().unwrap();
        assert!(matches!(result, Err(MonitorError::NotOwner(_))));

        // Still owned by this thread
        assert!(monitor.is_held_by_current_thread());
        monitor.exit().unwrap();
    }

    #[test]
    fn test_monitor_contended_handoff() {
        let monitor = Arc::new(Monitor::new());
        monitor.enter();

        let waiter = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                monitor.enter();
                let held = monitor.is_held_by_current_thread();
                monitor.exit().unwrap();
                held
            })
        };

        // Give the waiter time to block
        thread::sleep(Duration::from_millis(50));
        assert_eq!(monitor.waiting_count(), 1);

        monitor.exit().unwrap();
        assert!(waiter.join().unwrap());
        assert_eq!(monitor.owner(), None);
    }

    #[test]
    fn test_monitor_serializes_threads() {
        let monitor = Arc::new(Monitor::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let monitor = Arc::clone(&monitor);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..250 {
                        monitor.enter();
                        // Non-atomic read-modify-write, made safe by the monitor
                        let value = counter.load(Ordering::Relaxed);
                        counter.store(value + 1, Ordering::Relaxed);
                        monitor.exit().unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 1000);
    }
}
