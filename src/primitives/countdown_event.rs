//! General N→0 counter with a FIFO wait list (`spec.md` §4.4.1).

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::awaiter::{self, AwaiterNode, CancelableAwaiter, Kind};
use crate::coroutine::Handle;
use crate::error::AsyncError;
use crate::fifo::ConcurrentFifoList;
use crate::sync::ManualResetEvent;

use super::scope::AsyncScope;

pub struct CountdownEvent {
    wait_queue: ConcurrentFifoList<Handle>,
    count: AtomicI64,
    max_count: i64,
    scope: AsyncScope,
}

impl CountdownEvent {
    pub fn new(initially_zero: bool, max_count: i64) -> Self {
        CountdownEvent {
            wait_queue: ConcurrentFifoList::new(),
            count: AtomicI64::new(if initially_zero { 0 } else { 1 }),
            max_count,
            scope: AsyncScope::new(),
        }
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_zero(&self) -> bool {
        self.count() == 0
    }

    pub fn is_wait_list_empty(&self) -> bool {
        self.wait_queue.is_empty()
    }

    pub fn wait_listed_count(&self) -> usize {
        self.wait_queue.len()
    }

    /// Decrements, no-op at zero. Returns `true` only on the 1→0 transition
    /// (the call responsible for waking queued coroutines).
    pub fn count_down(&self) -> bool {
        let _guard = self.scope.enter();
        let mut prev = self.count.load(Ordering::Acquire);
        loop {
            if prev == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(prev, prev - 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break,
                Err(actual) => prev = actual,
            }
        }
        if prev == 1 {
            self.resume_waiting();
            true
        } else {
            false
        }
    }

    /// Increments, no-op at `max_count`. Returns `true` only on the 0→1
    /// transition.
    pub fn count_up(&self) -> bool {
        let mut prev = self.count.load(Ordering::Acquire);
        loop {
            if prev == self.max_count {
                return false;
            }
            match self.count.compare_exchange_weak(prev, prev + 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break,
                Err(actual) => prev = actual,
            }
        }
        prev == 0
    }

    fn resume_waiting(&self) {
        while let Some(coro) = self.wait_queue.dequeue() {
            if !self.is_zero() {
                self.wait_queue.enqueue(coro);
            } else {
                coro.schedule_or_chain();
            }
            if !self.is_zero() {
                break;
            }
        }
    }

    /// Enqueues a coroutine onto the wait list; rechecks zero afterward to
    /// avoid a lost wakeup raced against a concurrent `count_down`.
    pub(crate) fn enqueue_waiting(&self, coroutine: Arc<Handle>) -> bool {
        if self.is_zero() {
            return false;
        }
        let _guard = self.scope.enter();
        self.wait_queue.enqueue(coroutine);
        if self.is_zero() {
            self.resume_waiting();
        }
        true
    }

    pub(crate) fn remove(&self, coroutine: &Handle) -> bool {
        if self.is_zero() {
            return false;
        }
        let removed = self.wait_queue.remove(coroutine);
        if self.is_zero() {
            self.resume_waiting();
        }
        removed
    }

    /// Proxy-waiter: schedules a fire-and-forget coroutine that counts down
    /// `other` once `self` reaches zero (`original_source/event/async_countdown_event.cpp`).
    pub fn enqueue_countdown(&self, other: &Arc<CountdownEvent>) {
        let other = other.clone();
        self.enqueue_proxy(move || {
            other.count_down();
        });
    }

    /// Proxy-waiter: sets a synchronous manual-reset event once `self` reaches
    /// zero. Used by `SyncTask` completion plumbing.
    pub fn enqueue_manual_reset_event(&self, event: Arc<ManualResetEvent>) {
        self.enqueue_proxy(move || {
            event.set();
        });
    }

    pub(crate) fn enqueue_completion_task(&self, f: impl FnOnce() + Send + 'static) {
        self.enqueue_proxy(f);
    }

    fn enqueue_proxy(&self, f: impl FnOnce() + Send + 'static) {
        let coroutine = crate::task::simple_task::spawn_proxy(f);
        if !self.enqueue_waiting(coroutine.clone()) {
            debug_assert!(self.is_zero());
            coroutine.schedule();
        }
    }

    /// Awaits this countdown event reaching zero.
    pub fn wait(&self) -> CountdownEventAwaiter<'_> {
        CountdownEventAwaiter { event: self, node: None }
    }
}

struct CancelTarget {
    event: *const CountdownEvent,
    coroutine: Arc<Handle>,
}

// SAFETY: `event` is only dereferenced while `self` is registered in the
// event's wait list, and `CountdownEvent::drop` drains that list and spins on
// its `AsyncScope` before any field is torn down — see `primitives::scope`.
unsafe impl Send for CancelTarget {}
unsafe impl Sync for CancelTarget {}

impl CancelableAwaiter for CancelTarget {
    fn cancel(&self) -> bool {
        let event = unsafe { &*self.event };
        let removed = event.remove(&self.coroutine);
        if removed {
            self.coroutine.schedule();
        }
        removed
    }
}

pub struct CountdownEventAwaiter<'a> {
    event: &'a CountdownEvent,
    node: Option<Arc<AwaiterNode>>,
}

impl Future for CountdownEventAwaiter<'_> {
    type Output = Result<(), AsyncError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let coroutine = crate::runtime::current_coroutine().expect("await outside a coroutine");

        if let Some(node) = self.node.take() {
            return Poll::Ready(awaiter::on_resume(&coroutine, &node));
        }

        let advice = awaiter::on_ready(&coroutine, Kind::Event);
        if advice == awaiter::SuspensionAdvice::ShouldNotSuspend || self.event.is_zero() {
            coroutine.mark_running_resumed();
            return Poll::Ready(Ok(()));
        }

        let target: Arc<dyn CancelableAwaiter> = Arc::new(CancelTarget {
            event: self.event as *const CountdownEvent,
            coroutine: coroutine.clone(),
        });
        let node = awaiter::on_suspend(&coroutine, Kind::Event, target);
        node.set_maybe_blocked(true);

        let enqueued = self.event.enqueue_waiting(coroutine.clone());
        node.set_maybe_blocked(enqueued);

        if !enqueued {
            coroutine.mark_running_resumed();
            return Poll::Ready(awaiter::on_resume(&coroutine, &node));
        }

        self.node = Some(node);
        Poll::Pending
    }
}

impl Drop for CountdownEvent {
    fn drop(&mut self) {
        while let Some(coro) = self.wait_queue.dequeue() {
            coro.cancel();
            coro.schedule();
        }
        self.scope.wait_till_empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_down_reports_zero_transition() {
        let event = CountdownEvent::new(false, 3);
        assert!(!event.count_down());
        assert!(!event.count_down());
        assert!(event.count_down());
        assert!(event.is_zero());
    }

    #[test]
    fn count_up_reports_zero_transition() {
        let event = CountdownEvent::new(true, 2);
        assert!(event.count_up());
        assert!(!event.count_up());
    }
}
