//! Three-phase suspension protocol (`spec.md` C5 / §4.3).
//!
//! Each concrete awaiter is a type implementing [`std::future::Future`]. Its
//! `poll` embodies the three phases: the first call performs `onReady`/`onSuspend`
//! (returning `Pending` if the primitive did not resolve synchronously), and a
//! subsequent call — driven by the primitive scheduling the coroutine's waker —
//! performs `onResume`. See `SPEC_FULL.md` §0 for why `Future::poll` stands in
//! for a compiler-generated coroutine suspend point here.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Arc;

use crate::coroutine::Handle;
use crate::error::AsyncError;
use crate::fifo::Link;

/// Tags what a registered awaiter is waiting on, used only to decide whether
/// cancellation should raise on resume (`spec.md` I4) and for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Initial,
    Final,
    Yield,
    Task,
    Mutex,
    Event,
    Value,
    Barrier,
    ThreadPool,
}

impl Kind {
    /// `spec.md` I4: cancellation never raises for the Initial/Final/Yield
    /// suspend points, only for genuine blocking awaits.
    fn raises_cancellation(self) -> bool {
        !matches!(self, Kind::Initial | Kind::Final | Kind::Yield)
    }
}

/// What an `onReady`/`onSuspend` phase advises the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspensionAdvice {
    /// The primitive may proceed with its own suspension/chaining path.
    MaySuspend,
    /// Cross-pool hop or chained-execution budget exhausted: must enqueue.
    ShouldSuspend,
    /// The primitive already resolved synchronously; do not suspend at all.
    ShouldNotSuspend,
}

/// Dispatch target for `cancel()`'s awaiter-list walk (`spec.md` §4.5 step 4).
/// This is the Rust materialization of the "small vtable of three phase
/// functions" design note in `spec.md` §9 — a trait object in place of the
/// manual function-pointer table a `no_std`/C implementation would need.
pub trait CancelableAwaiter: Send + Sync {
    /// Detaches the coroutine from whatever wait structure it is parked on and
    /// reschedules it. Returns whether this call actually unblocked it.
    fn cancel(&self) -> bool;
}

/// A node in a coroutine's own list of in-flight awaiters.
pub struct AwaiterNode {
    next: AtomicPtr<AwaiterNode>,
    kind: Kind,
    maybe_blocked: AtomicBool,
    target: Arc<dyn CancelableAwaiter>,
}

unsafe impl Send for AwaiterNode {}
unsafe impl Sync for AwaiterNode {}

impl Link for AwaiterNode {
    fn next_ptr(&self) -> &AtomicPtr<AwaiterNode> {
        &self.next
    }
}

impl AwaiterNode {
    pub fn new(kind: Kind, target: Arc<dyn CancelableAwaiter>) -> Arc<AwaiterNode> {
        Arc::new(AwaiterNode {
            next: AtomicPtr::new(ptr::null_mut()),
            kind,
            maybe_blocked: AtomicBool::new(false),
            target,
        })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn maybe_blocked(&self) -> bool {
        self.maybe_blocked.load(Ordering::Acquire)
    }

    pub fn set_maybe_blocked(&self, value: bool) {
        self.maybe_blocked.store(value, Ordering::Release);
    }
}

pub(crate) fn cancel_node(node: &Arc<AwaiterNode>) -> bool {
    node.target.cancel()
}

/// Phase 1 (`onReady`). Transitions the coroutine to `Suspended` and returns
/// the advice the concrete awaiter's `poll` should act on. Call exactly once,
/// before the primitive's state is inspected.
pub(crate) fn on_ready(coroutine: &Arc<Handle>, kind: Kind) -> SuspensionAdvice {
    if matches!(kind, Kind::Initial | Kind::Final) {
        return SuspensionAdvice::MaySuspend;
    }
    coroutine.mark_suspended();
    crate::runtime::consume_chain_allowance()
}

/// Phase 2 (`onSuspend`). Registers the awaiter in the coroutine's in-flight
/// list so `cancel()` can find it.
pub(crate) fn on_suspend(coroutine: &Arc<Handle>, kind: Kind, target: Arc<dyn CancelableAwaiter>) -> Arc<AwaiterNode> {
    let node = AwaiterNode::new(kind, target);
    coroutine.register_awaiter(node.clone());
    node
}

/// Phase 3 (`onResume`). Pops the awaiter from the coroutine's in-flight list,
/// restores `Running`, and raises cancellation per `spec.md` I4.
pub(crate) fn on_resume(coroutine: &Arc<Handle>, node: &Arc<AwaiterNode>) -> Result<(), AsyncError> {
    coroutine.unregister_awaiter(node);
    coroutine.mark_running_resumed();

    if crate::runtime::shutdown_requested() {
        return Err(AsyncError::ShutdownCancelled);
    }
    if node.kind().raises_cancellation() && coroutine.is_cancelled() {
        return Err(AsyncError::Cancelled);
    }
    Ok(())
}
