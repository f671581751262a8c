//! Lock targets and their identity

use std::fmt;
use std::sync::Arc;

/// Identity of a lock target, derived from its heap address
///
/// Two handles have the same `Identity` exactly when they point at the same
/// allocation. The value is stable for the life of the allocation; once the
/// target is dropped the address may be reused, which is why the registry
/// pairs every identity with a [`Liveness`] probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity(usize);

impl Identity {
    /// Get the numeric address value
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Liveness probe for a lock target
///
/// Wraps a weak handle to the target so the registry can tell whether the
/// allocation behind an [`Identity`] is still reachable without keeping it
/// alive itself.
pub struct Liveness(Box<dyn Fn() -> bool + Send + Sync>);

impl Liveness {
    /// Create a probe from a closure over a weak handle
    pub fn new(probe: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self(Box::new(probe))
    }

    /// Check whether the target is still reachable
    pub fn is_live(&self) -> bool {
        (self.0)()
    }
}

impl fmt::Debug for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Liveness")
            .field("live", &self.is_live())
            .finish()
    }
}

/// Capability for types that can key a lock by identity
///
/// Only shared-ownership handles implement this: the lock key is the address
/// of the allocation, so the target must have reference semantics. Plain
/// values are rejected at compile time.
///
/// ```compile_fail
/// // An integer has no stable identity to key a lock by.
/// keylock::lock(&42u32, || ()).unwrap();
/// ```
pub trait Lockable {
    /// Identity used as the lock key
    fn identity(&self) -> Identity;

    /// Probe that reports whether the target is still reachable
    fn watch(&self) -> Liveness;

    /// Textual rendering of the target, used by trace events
    fn describe(&self) -> String;
}

impl<T: ?Sized + Send + Sync + 'static> Lockable for Arc<T> {
    fn identity(&self) -> Identity {
        Identity(Arc::as_ptr(self).cast::<()>() as usize)
    }

    fn watch(&self) -> Liveness {
        let weak = Arc::downgrade(self);
        Liveness::new(move || weak.strong_count() > 0)
    }

    fn describe(&self) -> String {
        format!("{}@{}", std::any::type_name::<T>(), self.identity())
    }
}
