//! Identity-keyed mutual exclusion
//!
//! This crate serializes access to a shared object for call sites that share
//! no explicit lock handle: the lock key is the *identity* of the target, so
//! any code holding a handle to the same allocation contends on the same
//! lock. It provides:
//! - A weak-keyed, process-wide registry of per-identity lock state
//! - An auto-clearing advisory signal with single-waiter wake-up
//! - A reentrant exclusion monitor with owner and depth tracking
//! - A lock service that runs caller-supplied work under the lock and
//!   releases it even when the work panics
//!
//! ```
//! use std::sync::Arc;
//!
//! let account = Arc::new(String::from("ledger"));
//! let mut balance = 100;
//!
//! keylock::lock(&account, || balance += 1).unwrap();
//! assert_eq!(balance, 101);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod monitor;
pub mod registry;
pub mod service;
pub mod signal;
pub mod target;

pub use error::{BodyError, LockError};
pub use monitor::{Monitor, MonitorError};
pub use registry::{LockState, Registry};
pub use service::{default_service, lock, lock_timeout, lock_wait, lock_with, LockService, WaitMode};
pub use signal::{AcquireMode, Signal};
pub use target::{Identity, Liveness, Lockable};
