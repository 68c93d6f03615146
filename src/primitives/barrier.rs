//! Fixed-capacity rendezvous barrier (`spec.md` §4.4.5).

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::awaiter::{self, AwaiterNode, CancelableAwaiter, Kind};
use crate::coroutine::Handle;
use crate::error::AsyncError;
use crate::fifo::ConcurrentFifoList;

use super::scope::AsyncScope;

pub struct Barrier {
    capacity: usize,
    wait_queue: ConcurrentFifoList<Handle>,
    arrived: AtomicUsize,
    cancelled: AtomicBool,
    scope: AsyncScope,
}

impl Barrier {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "barrier capacity must be positive");
        Barrier {
            capacity,
            wait_queue: ConcurrentFifoList::new(),
            arrived: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            scope: AsyncScope::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release_all(&self) {
        while let Some(coro) = self.wait_queue.dequeue() {
            coro.schedule_or_chain();
        }
    }

    /// Enqueues `coroutine` and, if it is the party that completes the round,
    /// releases all `capacity` waiters (including itself) and resets the
    /// counter for the next round.
    fn arrive(&self, coroutine: Arc<Handle>) {
        let _guard = self.scope.enter();
        self.wait_queue.enqueue(coroutine);
        let prev = self.arrived.fetch_add(1, Ordering::AcqRel);
        if prev + 1 == self.capacity {
            self.arrived.store(0, Ordering::Release);
            self.release_all();
        }
    }

    /// Cancels every pending waiter; used by shutdown and by `Drop`
    /// (`spec.md` §8 scenario 5: barrier destruction races).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        while let Some(coro) = self.wait_queue.dequeue() {
            coro.cancel();
            coro.schedule();
        }
    }

    pub fn arrive_and_wait(&self) -> BarrierAwaiter<'_> {
        BarrierAwaiter { barrier: self, node: None }
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        self.cancel();
        self.scope.wait_till_empty();
    }
}

struct CancelTarget {
    barrier: *const Barrier,
    coroutine: Arc<Handle>,
}

// SAFETY: see `primitives::countdown_event::CancelTarget`.
unsafe impl Send for CancelTarget {}
unsafe impl Sync for CancelTarget {}

impl CancelableAwaiter for CancelTarget {
    fn cancel(&self) -> bool {
        let barrier = unsafe { &*self.barrier };
        let removed = barrier.wait_queue.remove(&self.coroutine);
        if removed {
            self.coroutine.schedule();
        }
        removed
    }
}

pub struct BarrierAwaiter<'a> {
    barrier: &'a Barrier,
    node: Option<Arc<AwaiterNode>>,
}

impl Future for BarrierAwaiter<'_> {
    type Output = Result<(), AsyncError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let coroutine = crate::runtime::current_coroutine().expect("await outside a coroutine");

        if let Some(node) = self.node.take() {
            return Poll::Ready(awaiter::on_resume(&coroutine, &node));
        }

        let _advice = awaiter::on_ready(&coroutine, Kind::Barrier);

        let target: Arc<dyn CancelableAwaiter> = Arc::new(CancelTarget {
            barrier: self.barrier as *const Barrier,
            coroutine: coroutine.clone(),
        });
        let node = awaiter::on_suspend(&coroutine, Kind::Barrier, target);
        node.set_maybe_blocked(true);

        self.barrier.arrive(coroutine);
        self.node = Some(node);
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_exactly_at_capacity() {
        let barrier = Barrier::new(2);
        let a = crate::coroutine::Handle::new(crate::options::ResolvedPool::Default, "a", Box::pin(async {}));
        let b = crate::coroutine::Handle::new(crate::options::ResolvedPool::Default, "b", Box::pin(async {}));
        assert_eq!(barrier.wait_queue.len(), 0);
        barrier.arrive(a);
        assert_eq!(barrier.wait_queue.len(), 1);
        barrier.arrive(b);
        assert_eq!(barrier.wait_queue.len(), 0);
    }

    #[test]
    fn drop_cancels_pending_waiter() {
        let barrier = Barrier::new(2);
        let coro = crate::coroutine::Handle::new(crate::options::ResolvedPool::Default, "waiter", Box::pin(async {}));
        barrier.arrive(coro.clone());
        assert_eq!(barrier.wait_queue.len(), 1);
        assert!(!coro.is_cancelled());
        drop(barrier);
        assert!(coro.is_cancelled());
    }
}
