//! Per-primitive entry/exit counter ("async scope", `spec.md` §5 / §9).
//!
//! Every async primitive embeds one of these. Its destructor spin-waits for the
//! counter to reach zero before the primitive's fields may be torn down, so a
//! `CancelableAwaiter` holding a raw pointer back into the primitive (see
//! `primitives::countdown_event`) stays valid for as long as it is registered.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::spin::SpinWait;

#[derive(Debug, Default)]
pub(crate) struct AsyncScope {
    count: AtomicUsize,
}

impl AsyncScope {
    pub fn new() -> Self {
        AsyncScope { count: AtomicUsize::new(0) }
    }

    #[must_use]
    pub fn enter(&self) -> ScopeGuard<'_> {
        self.count.fetch_add(1, Ordering::AcqRel);
        ScopeGuard { scope: self }
    }

    pub fn wait_till_empty(&self) {
        let mut spin = SpinWait::new();
        while self.count.load(Ordering::Acquire) != 0 {
            spin.spin_once();
        }
    }
}

pub(crate) struct ScopeGuard<'a> {
    scope: &'a AsyncScope,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.scope.count.fetch_sub(1, Ordering::AcqRel);
    }
}
