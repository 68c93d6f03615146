//! Coroutine lifecycle state machine (`spec.md` C4 / §4.1).
//!
//! A [`Handle`] is the runtime's descriptor for a suspended computation: atomic
//! status, cancellation flags, the coroutine's own list of in-flight awaiters, a
//! completion event gating destruction, a weak owner back-pointer, pool affinity,
//! and the boxed future that is the coroutine body. It is the Rust-native stand-in
//! for the original's compiler-generated coroutine frame (see `SPEC_FULL.md` §0).

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::fifo::{ConcurrentFifoList, Link};
use crate::options::ResolvedPool;
use crate::primitives::CountdownEvent;

/// States a [`Handle`] can be in. Transitions are only ever made through the
/// named `mark_*`/`begin_*`/`finish_*` methods below, each of which aborts the
/// process if observed in a status outside its documented legal source set
/// (`spec.md` I1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    NotStarted = 0,
    Running,
    Paused,
    Suspended,
    PauseOnRunning,
    Yielded,
    Returned,
    Completed,
    Abandoned,
    Resumed,
    ReturnedCompleted,
    YieldedSuspended,
    FinalSuspended,
    AbandonedFinalSuspended,
    AbandonedYieldSuspended,
    AbandonedCompleted,
    CompletedFinalSuspended,
}

impl Status {
    const MAX: u8 = Status::CompletedFinalSuspended as u8;

    fn from_u8(v: u8) -> Status {
        debug_assert!(v <= Self::MAX);
        // SAFETY: `Status` is `repr(u8)` and every value in `0..=MAX` is a valid
        // discriminant; `AtomicStatus` never stores anything else.
        unsafe { std::mem::transmute(v) }
    }
}

/// Thin atomic wrapper around [`Status`] with CAS-loop transition helpers.
struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    fn new(initial: Status) -> Self {
        AtomicStatus(AtomicU8::new(initial as u8))
    }

    fn load(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Transitions unconditionally, asserting the prior value was one of `from`.
    /// Aborts the process otherwise — this is the enforcement point for I1.
    fn transition(&self, from: &[Status], to: Status) -> Status {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let current_status = Status::from_u8(current);
            if !from.contains(&current_status) {
                illegal_transition(current_status, to);
            }
            match self.0.compare_exchange_weak(current, to as u8, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return current_status,
                Err(actual) => current = actual,
            }
        }
    }

    /// Attempts the transition, returning `None` without aborting if the
    /// current value is not in `from` — used where a race against another
    /// transition is an expected, legal outcome (e.g. cancellation racing a
    /// coroutine that is self-unblocking).
    fn try_transition(&self, from: &[Status], to: Status) -> Option<Status> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let current_status = Status::from_u8(current);
            if !from.contains(&current_status) {
                return None;
            }
            match self.0.compare_exchange_weak(current, to as u8, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Some(current_status),
                Err(actual) => current = actual,
            }
        }
    }
}

#[cold]
fn illegal_transition(from: Status, to: Status) -> ! {
    // `spec.md` I1: any transition outside the legal table is a programming
    // violation, not a recoverable error.
    log::error!("illegal coroutine state transition {from:?} -> {to:?}");
    std::process::abort();
}

/// Intrusive link used both for run-queue membership and for membership in a
/// primitive's wait list (`spec.md` §9: "use the coroutine's own next-pointer").
pub(crate) struct QueueLink {
    next: AtomicPtr<Handle>,
}

impl Link for Handle {
    fn next_ptr(&self) -> &AtomicPtr<Handle> {
        &self.queue_link.next
    }
}

/// The body of a coroutine: a boxed, pinned future. Wrapped so `Handle` does not
/// need to be generic.
pub(crate) type Body = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The runtime's descriptor for a suspended computation (`spec.md` §3).
pub struct Handle {
    pub(crate) queue_link: QueueLink,
    status: AtomicStatus,
    cancelled: AtomicBool,
    cancel_abandoned: AtomicBool,
    abandoned: AtomicBool,
    pool: ResolvedPool,
    owner: AtomicPtr<Handle>,
    /// Gates destruction until every child that called `set_owner(self)` has
    /// signalled completion (`spec.md` I3).
    pub(crate) completion_event: CountdownEvent,
    /// Awaiters currently registered on this coroutine, walked by `cancel()`.
    awaiters: ConcurrentFifoList<crate::awaiter::AwaiterNode>,
    body: Cell<Option<Body>>,
    waker: Cell<Option<Waker>>,
    name: &'static str,
}

unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coroutine({}, {:?})", self.name, self.status.load())
    }
}

impl Handle {
    pub(crate) fn new(pool: ResolvedPool, name: &'static str, body: Body) -> Arc<Handle> {
        Arc::new(Handle {
            queue_link: QueueLink {
                next: AtomicPtr::new(std::ptr::null_mut()),
            },
            status: AtomicStatus::new(Status::NotStarted),
            cancelled: AtomicBool::new(false),
            cancel_abandoned: AtomicBool::new(false),
            abandoned: AtomicBool::new(false),
            pool,
            owner: AtomicPtr::new(std::ptr::null_mut()),
            completion_event: CountdownEvent::new(false, 1),
            awaiters: ConcurrentFifoList::new(),
            body: Cell::new(Some(body)),
            waker: Cell::new(None),
            name,
        })
    }

    pub fn status(&self) -> Status {
        self.status.load()
    }

    pub fn pool(&self) -> ResolvedPool {
        self.pool
    }

    pub fn debug_name(&self) -> &'static str {
        self.name
    }

    pub fn is_done(&self) -> bool {
        matches!(
            self.status(),
            Status::Returned
                | Status::Completed
                | Status::ReturnedCompleted
                | Status::FinalSuspended
                | Status::CompletedFinalSuspended
                | Status::AbandonedFinalSuspended
                | Status::AbandonedCompleted
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn should_cancel_abandoned(&self) -> bool {
        self.cancel_abandoned.load(Ordering::Acquire)
    }

    pub fn set_cancel_abandoned(&self, value: bool) {
        self.cancel_abandoned.store(value, Ordering::Release);
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }

    /// Records `self` as the owner of a child coroutine; the child's completion
    /// signals back via [`Handle::signal_owner`] (`spec.md` §4.7/§9 back-pointer).
    pub fn set_owner(self: &Arc<Self>, child: &Handle) {
        self.completion_event.count_up();
        let owner_ptr = Arc::as_ptr(self) as *mut Handle;
        child.owner.store(owner_ptr, Ordering::Release);
    }

    pub(crate) fn signal_owner(&self) {
        let owner = self.owner.swap(std::ptr::null_mut(), Ordering::AcqRel);
        if !owner.is_null() {
            // SAFETY: the owner back-pointer is kept alive by the owner's own
            // completion-event count-up, independent of this child's lifetime.
            unsafe { (*owner).completion_event.count_down() };
        }
    }

    /// Registers an awaiter in this coroutine's in-flight list (`onSuspend`,
    /// `spec.md` §4.3). The node's lifetime is tied to the awaiter future, which
    /// outlives the registration because it only completes after being popped.
    pub(crate) fn register_awaiter(self: &Arc<Self>, node: Arc<crate::awaiter::AwaiterNode>) {
        self.awaiters.enqueue(node);
    }

    pub(crate) fn unregister_awaiter(&self, node: &crate::awaiter::AwaiterNode) {
        self.awaiters.remove(node);
    }

    fn set_waker(&self, waker: &Waker) {
        self.waker.set(Some(waker.clone()));
    }

    // --- status transitions -------------------------------------------------

    pub(crate) fn mark_running_first_time(&self) -> bool {
        self.status
            .try_transition(&[Status::NotStarted], Status::Running)
            .is_some()
    }

    pub(crate) fn mark_running_resumed(&self) {
        self.status.transition(
            &[
                Status::Suspended,
                Status::Paused,
                Status::YieldedSuspended,
                Status::Resumed,
                Status::Abandoned,
            ],
            Status::Running,
        );
    }

    pub(crate) fn mark_suspended(&self) {
        self.status.transition(&[Status::Running], Status::Suspended);
    }

    pub(crate) fn mark_yielded(&self) {
        self.status.transition(&[Status::Running], Status::Yielded);
    }

    pub(crate) fn mark_yielded_suspended(&self) {
        self.status.transition(&[Status::Yielded], Status::YieldedSuspended);
    }

    pub(crate) fn mark_returned(&self) {
        self.status.transition(&[Status::Running], Status::Returned);
    }

    /// `spec.md` §4.7 final_suspend: completion-event reaches zero immediately.
    /// Lands on `AbandonedCompleted` instead of `Completed` if this coroutine
    /// was marked abandoned (`spec.md` §4.7/§7, `Handle::mark_abandoned`).
    pub(crate) fn mark_completed_immediate(&self) {
        let to = if self.is_abandoned() { Status::AbandonedCompleted } else { Status::Completed };
        self.status.transition(&[Status::Returned], to);
    }

    /// `spec.md` §4.7 final_suspend: still-outstanding children, defer.
    pub(crate) fn mark_final_suspended(&self) {
        let to = if self.is_abandoned() { Status::AbandonedFinalSuspended } else { Status::FinalSuspended };
        self.status.transition(&[Status::Returned], to);
    }

    /// Deferred completion from `enqueueAsyncSetCompletedStateTask` landing.
    pub(crate) fn mark_completed_deferred(&self) -> Status {
        let to = if self.is_abandoned() { Status::AbandonedCompleted } else { Status::Completed };
        self.status
            .transition(&[Status::FinalSuspended, Status::AbandonedFinalSuspended], to)
    }

    /// Marks this coroutine abandoned — its owning `Task`/`AsyncTask`/`SyncTask`
    /// wrapper was dropped with `should_cancel_abandoned()` set and the
    /// coroutine not yet done (`spec.md` §4.7/§7). Uses `try_transition`
    /// rather than the aborting `transition`: the coroutine may concurrently
    /// be mid-resume on a worker thread (e.g. racing `Handle::cancel`'s own
    /// reschedule), in which case losing the race here is a legal no-op, not
    /// a programming violation.
    pub(crate) fn mark_abandoned(&self) -> bool {
        let marked = self
            .status
            .try_transition(
                &[
                    Status::NotStarted,
                    Status::Suspended,
                    Status::YieldedSuspended,
                    Status::Returned,
                    Status::ReturnedCompleted,
                    Status::FinalSuspended,
                    Status::CompletedFinalSuspended,
                    Status::Yielded,
                ],
                Status::Abandoned,
            )
            .is_some();
        if marked {
            self.abandoned.store(true, Ordering::Release);
        }
        marked
    }

    // --- cancellation (`spec.md` §4.5) --------------------------------------

    /// Step 1: idempotent flag set. Returns whether this call set it (for
    /// logging only — the protocol itself is idempotent regardless).
    fn set_cancelled_flag(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    /// Drives the full cancellation protocol described in `spec.md` §4.5.
    /// May be invoked by any thread, any number of times (`spec.md` P5).
    pub fn cancel(self: &Arc<Self>) {
        if self.set_cancelled_flag() {
            log::trace!("{:?} cancelled", self);
        }

        if self.awaiters.is_empty() {
            return;
        }

        let claimed = self
            .status
            .try_transition(&[Status::Suspended], Status::PauseOnRunning);
        if claimed.is_none() {
            return;
        }

        loop {
            let mut drained_any = false;
            let mut requeue = Vec::new();
            while let Some(node) = self.awaiters.dequeue() {
                drained_any = true;
                if node.maybe_blocked() {
                    let _unblocked = crate::awaiter::cancel_node(&node);
                } else {
                    requeue.push(node);
                }
            }
            for node in requeue {
                self.awaiters.enqueue(node);
            }

            if self.awaiters.is_empty() {
                break;
            }
            if self.status() == Status::Paused {
                break;
            }
        }

        let prior = self
            .status
            .try_transition(&[Status::PauseOnRunning, Status::Paused], Status::Resumed);
        if prior == Some(Status::Paused) {
            self.status.transition(&[Status::Resumed], Status::Running);
            self.wake();
        }
    }

    /// Schedules this coroutine onto its pool's run queue.
    pub fn schedule(self: &Arc<Self>) {
        crate::runtime::schedule(self.clone());
    }

    /// Wakes this coroutine: if the calling thread is a worker with chain
    /// budget left, drives it inline on this thread instead of round-tripping
    /// through the run queue (`spec.md` §4.6 "chained execution", P7).
    /// Falls back to an ordinary [`Handle::schedule`] otherwise.
    pub(crate) fn schedule_or_chain(self: &Arc<Self>) {
        crate::runtime::schedule_or_chain(self.clone());
    }

    fn wake(&self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }

    /// Drives the coroutine body one step. Called only by a worker thread that
    /// currently owns exclusive execution rights over this coroutine
    /// (`spec.md` I2).
    pub(crate) fn poll_once(self: &Arc<Self>) -> Poll<()> {
        let first_time = self.status() == Status::NotStarted;
        if first_time {
            self.mark_running_first_time();
        } else {
            self.mark_running_resumed();
        }

        let waker = crate::runtime::waker_for(self.clone());
        self.set_waker(&waker);
        let mut cx = Context::from_waker(&waker);

        let mut body = match self.body.take() {
            Some(b) => b,
            None => return Poll::Ready(()),
        };

        let poll = body.as_mut().poll(&mut cx);
        match poll {
            Poll::Pending => {
                self.body.set(Some(body));
                Poll::Pending
            }
            Poll::Ready(()) => {
                self.mark_returned();
                if self.completion_event.count() == 1 {
                    self.mark_completed_immediate();
                    self.completion_event.count_down();
                    self.signal_owner();
                } else {
                    self.mark_final_suspended();
                    let handle = self.clone();
                    self.completion_event.enqueue_completion_task(move || {
                        handle.signal_owner();
                        handle.mark_completed_deferred();
                    });
                    self.completion_event.count_down();
                }
                Poll::Ready(())
            }
        }
    }
}
