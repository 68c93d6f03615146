//! Recoverable error surface (`spec.md` §7, categories 1 and 2).
//!
//! Programming violations (category 3 — illegal state transitions, awaiter
//! protocol misuse) are never represented here: those abort the process from
//! `coroutine::illegal_transition` or a `debug_assert!`, by design.

use std::fmt;

/// Errors observable by a coroutine awaiting a primitive or task.
#[derive(thiserror::Error, Debug, Clone)]
pub enum AsyncError {
    /// Raised at an awaiter's `onResume` when the coroutine's cancelled flag is
    /// set, or the primitive being awaited was cancelled/destroyed while the
    /// coroutine was waiting (`spec.md` §7.1).
    #[error("coroutine was cancelled")]
    Cancelled,

    /// Raised in place of [`AsyncError::Cancelled`] during immediate pool
    /// shutdown, even on coroutines that opted out of ordinary cancellation.
    /// Handlers must not swallow it (`spec.md` §7.1).
    #[error("coroutine was cancelled: shutting down")]
    ShutdownCancelled,

    /// A synchronous wrapper's `std::sync::Mutex` was poisoned by a panicking
    /// holder. Not present in the original source (its coroutine path never
    /// touched an OS mutex); added because `sync::ManualResetEvent` and peers
    /// do (`SPEC_FULL.md` ambient error-handling section).
    #[error("synchronous event mutex poisoned")]
    Poisoned,

    /// A user exception propagated out of a coroutine body, boxed for
    /// transport across the await boundary (`spec.md` §7.2).
    #[error("coroutine body panicked: {0}")]
    UserPanic(PanicPayload),
}

impl AsyncError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AsyncError::Cancelled | AsyncError::ShutdownCancelled)
    }

    pub fn shutdown_cancellation() -> AsyncError {
        AsyncError::ShutdownCancelled
    }
}

/// Opaque, `Clone`-able wrapper around a caught panic payload, so a single
/// panic can be observed by every awaiter of a shared [`crate::task::AsyncTask`].
#[derive(Clone)]
pub struct PanicPayload(std::sync::Arc<str>);

impl PanicPayload {
    pub fn from_any(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        PanicPayload(std::sync::Arc::from(message))
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

pub type Result<T> = std::result::Result<T, AsyncError>;
