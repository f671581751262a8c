//! Lock service composing registry, signal, and monitor

use crate::error::{BodyError, LockError};
use crate::registry::Registry;
use crate::signal::AcquireMode;
use crate::target::Lockable;
use log::trace;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

/// How long the advisory stage is allowed to wait for the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitMode {
    /// Probe the signal without blocking
    #[default]
    NoWait,
    /// Block on the signal until it becomes available
    WaitIndefinite,
    /// Block on the signal up to the given duration; zero behaves like
    /// [`WaitMode::NoWait`]
    WaitTimeout(Duration),
}

impl WaitMode {
    fn advisory(self) -> AcquireMode {
        match self {
            WaitMode::NoWait => AcquireMode::Probe,
            WaitMode::WaitIndefinite => AcquireMode::Indefinite,
            WaitMode::WaitTimeout(timeout) => AcquireMode::Bounded(timeout),
        }
    }
}

/// Identity-keyed lock service
///
/// Serializes units of work per target identity: at most one unit of work
/// executes for a given identity at any time, across all threads sharing
/// this service. Call sites need no shared lock handle, only the target.
///
/// A process-wide instance backs the crate-level [`lock`], [`lock_wait`],
/// [`lock_timeout`], and [`lock_with`] functions; separate instances keep
/// separate registries.
pub struct LockService {
    registry: Registry,
}

impl LockService {
    /// Create a service with its own registry
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// The registry backing this service
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run `work` exclusively for `target`, probing the signal without
    /// blocking (the default mode)
    pub fn lock<T, R, F>(&self, target: &T, work: F) -> Result<R, LockError>
    where
        T: Lockable + ?Sized,
        F: FnOnce() -> R,
    {
        self.lock_with(target, WaitMode::NoWait, work)
    }

    /// Run `work` exclusively for `target`, waiting on the signal
    /// indefinitely
    pub fn lock_wait<T, R, F>(&self, target: &T, work: F) -> Result<R, LockError>
    where
        T: Lockable + ?Sized,
        F: FnOnce() -> R,
    {
        self.lock_with(target, WaitMode::WaitIndefinite, work)
    }

    /// Run `work` exclusively for `target`, waiting on the signal up to
    /// `timeout`
    pub fn lock_timeout<T, R, F>(
        &self,
        target: &T,
        timeout: Duration,
        work: F,
    ) -> Result<R, LockError>
    where
        T: Lockable + ?Sized,
        F: FnOnce() -> R,
    {
        self.lock_with(target, WaitMode::WaitTimeout(timeout), work)
    }

    /// Run `work` exclusively for `target` with an explicit wait mode
    ///
    /// The signal wait is advisory: it throttles contention, but exclusivity
    /// comes from the monitor, which is acquired unconditionally afterwards
    /// even when a bounded wait elapsed. Reentrant calls from the owning
    /// thread increment the monitor depth instead of blocking; the signal is
    /// not reentrancy-aware and runs its full acquire/notify cycle on every
    /// call, so reentrant acquisition composes with the probing modes rather
    /// than [`WaitMode::WaitIndefinite`].
    ///
    /// A panic from `work` is captured, the lock is released, and the panic
    /// is surfaced as [`LockError::Body`]. State mutated through captured
    /// references stays visible to the caller either way.
    pub fn lock_with<T, R, F>(&self, target: &T, mode: WaitMode, work: F) -> Result<R, LockError>
    where
        T: Lockable + ?Sized,
        F: FnOnce() -> R,
    {
        let thread_id = thread::current().id();
        let rendering = target.describe();
        trace!(
            "lock requested: target={}, thread={:?}, mode={:?}",
            rendering,
            thread_id,
            mode
        );

        let state = self.registry.get_or_create(target);

        if !state.signal().acquire(mode.advisory()) {
            trace!(
                "advisory wait elapsed: target={}, thread={:?}",
                rendering,
                thread_id
            );
        }

        state.monitor().enter();
        trace!(
            "lock granted: target={}, thread={:?}",
            rendering,
            thread_id
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(work));

        // Release order is exit-before-notify, always
        state.monitor().exit()?;
        state.signal().notify();
        trace!(
            "lock released: target={}, thread={:?}",
            rendering,
            thread_id
        );

        match outcome {
            Ok(value) => Ok(value),
            Err(payload) => Err(BodyError::new(rendering, payload).into()),
        }
    }
}

impl Default for LockService {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide lock service backing the crate-level functions
pub fn default_service() -> &'static LockService {
    static DEFAULT: once_cell::sync::Lazy<LockService> = once_cell::sync::Lazy::new(LockService::new);
    &DEFAULT
}

/// Run `work` exclusively for `target` on the process-wide service
pub fn lock<T, R, F>(target: &T, work: F) -> Result<R, LockError>
where
    T: Lockable + ?Sized,
    F: FnOnce() -> R,
{
    default_service().lock(target, work)
}

/// Run `work` exclusively for `target` on the process-wide service, waiting
/// on the signal indefinitely
pub fn lock_wait<T, R, F>(target: &T, work: F) -> Result<R, LockError>
where
    T: Lockable + ?Sized,
    F: FnOnce() -> R,
{
    default_service().lock_wait(target, work)
}

/// Run `work` exclusively for `target` on the process-wide service, waiting
/// on the signal up to `timeout`
pub fn lock_timeout<T, R, F>(target: &T, timeout: Duration, work: F) -> Result<R, LockError>
where
    T: Lockable + ?Sized,
    F: FnOnce() -> R,
{
    default_service().lock_timeout(target, timeout, work)
}

/// Run `work` exclusively for `target` on the process-wide service with an
/// explicit wait mode
pub fn lock_with<T, R, F>(target: &T, mode: WaitMode, work: F) -> Result<R, LockError>
where
    T: Lockable + ?Sized,
    F: FnOnce() -> R,
{
    default_service().lock_with(target, mode, work)
}
