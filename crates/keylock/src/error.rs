//! Error taxonomy for the lock service

use crate::monitor::MonitorError;
use std::any::Any;
use std::fmt;

/// A unit of work panicked while holding the lock
///
/// The panic is captured so the release path always runs, then surfaced to
/// the caller as a recoverable error carrying a rendering of the target and
/// the panic message. The raw payload is preserved for callers that want to
/// re-raise it with [`std::panic::resume_unwind`].
pub struct BodyError {
    target: String,
    message: String,
    payload: Box<dyn Any + Send + 'static>,
}

impl BodyError {
    pub(crate) fn new(target: String, payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            String::from("non-string panic payload")
        };
        Self {
            target,
            message,
            payload,
        }
    }

    /// Rendering of the target that was locked when the work failed
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Panic message, when the payload was a string
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Recover the raw panic payload
    pub fn into_payload(self) -> Box<dyn Any + Send + 'static> {
        self.payload
    }
}

impl fmt::Display for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "work panicked while holding lock on {}: {}",
            self.target, self.message
        )
    }
}

// Manual impl: the payload is not Debug
impl fmt::Debug for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyError")
            .field("target", &self.target)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl std::error::Error for BodyError {}

/// Errors surfaced by [`LockService`](crate::LockService) operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The caller-supplied work panicked; the lock was released first
    #[error(transparent)]
    Body(#[from] BodyError),

    /// Monitor contract violation
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}
