//! Auto-clearing advisory signal

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// How long [`Signal::acquire`] is allowed to block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Check-and-clear without blocking
    Probe,
    /// Block until the signal becomes available
    Indefinite,
    /// Block up to the given duration; a zero duration behaves like `Probe`
    Bounded(Duration),
}

/// Binary auto-clearing wait/notify primitive
///
/// The signal starts available. A successful [`acquire`](Signal::acquire)
/// clears it; [`notify`](Signal::notify) sets it back and wakes at most one
/// blocked waiter. The signal is advisory: it throttles contention ahead of
/// the real exclusive acquisition in [`Monitor`](crate::Monitor) but grants
/// no exclusivity by itself, and a thread that skips it entirely can still
/// win the monitor.
pub struct Signal {
    /// true = available
    available: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    /// Create a new signal in the available state
    pub fn new() -> Self {
        Self {
            available: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    /// Wait for the signal according to `mode`
    ///
    /// Returns true if the signal was available (and was cleared by this
    /// call), false if it was not within the mode's allowance. On a bounded
    /// timeout the state is left unchanged.
    pub fn acquire(&self, mode: AcquireMode) -> bool {
        match mode {
            AcquireMode::Probe => {
                let mut available = self.available.lock();
                if *available {
                    *available = false;
                    true
                } else {
                    false
                }
            }
            AcquireMode::Indefinite => {
                let mut available = self.available.lock();
                while !*available {
                    self.cond.wait(&mut available);
                }
                *available = false;
                true
            }
            AcquireMode::Bounded(timeout) => {
                if timeout.is_zero() {
                    return self.acquire(AcquireMode::Probe);
                }
                let deadline = Instant::now() + timeout;
                let mut available = self.available.lock();
                while !*available {
                    if self.cond.wait_until(&mut available, deadline).timed_out() {
                        break;
                    }
                }
                if *available {
                    *available = false;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Make the signal available and wake at most one blocked waiter
    ///
    /// With no waiter blocked, the signal simply stays available for the
    /// next `acquire`.
    pub fn notify(&self) {
        let mut available = self.available.lock();
        *available = true;
        drop(available);
        self.cond.notify_one();
    }

    /// Check availability without clearing it
    pub fn is_available(&self) -> bool {
        *self.available.lock()
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
