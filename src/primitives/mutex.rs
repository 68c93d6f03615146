//! FIFO-fair async mutex (`spec.md` §4.4.4).

use std::future::Future;
use std::pin::Pin;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::awaiter::{self, AwaiterNode, CancelableAwaiter, Kind};
use crate::coroutine::Handle;
use crate::error::AsyncError;
use crate::fifo::ConcurrentFifoList;

use super::scope::AsyncScope;

pub struct Mutex {
    owner: AtomicPtr<Handle>,
    wait_queue: ConcurrentFifoList<Handle>,
    cancelled: AtomicBool,
    scope: AsyncScope,
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutex {
    pub fn new() -> Self {
        Mutex {
            owner: AtomicPtr::new(ptr::null_mut()),
            wait_queue: ConcurrentFifoList::new(),
            cancelled: AtomicBool::new(false),
            scope: AsyncScope::new(),
        }
    }

    fn try_lock(&self, coroutine: &Arc<Handle>) -> bool {
        let coro_ptr = Arc::as_ptr(coroutine) as *mut Handle;
        self.owner
            .compare_exchange(ptr::null_mut(), coro_ptr, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Dequeues the oldest waiter in FIFO order and hands it ownership, retrying
    /// if another release claims the lock concurrently (`spec.md` §4.4.4).
    fn try_claim_from_queue(&self) {
        loop {
            if !self.owner.load(Ordering::Acquire).is_null() {
                return;
            }
            match self.wait_queue.dequeue() {
                Some(next) => {
                    let next_ptr = Arc::as_ptr(&next) as *mut Handle;
                    if self
                        .owner
                        .compare_exchange(ptr::null_mut(), next_ptr, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        next.schedule_or_chain();
                        return;
                    }
                    self.wait_queue.enqueue(next);
                }
                None => return,
            }
        }
    }

    fn unlock(&self, coroutine: &Arc<Handle>) -> Result<(), AsyncError> {
        let _guard = self.scope.enter();
        let coro_ptr = Arc::as_ptr(coroutine) as *mut Handle;
        if self
            .owner
            .compare_exchange(coro_ptr, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return if self.cancelled.load(Ordering::Acquire) {
                Err(AsyncError::Cancelled)
            } else {
                Ok(())
            };
        }
        self.try_claim_from_queue();
        Ok(())
    }

    /// Cancels every pending waiter; used by shutdown and by `Drop`.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        while let Some(coro) = self.wait_queue.dequeue() {
            coro.cancel();
            coro.schedule();
        }
    }

    pub fn lock(&self) -> MutexAwaiter<'_> {
        MutexAwaiter { mutex: self, node: None }
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        self.cancel();
        self.scope.wait_till_empty();
    }
}

struct CancelTarget {
    mutex: *const Mutex,
    coroutine: Arc<Handle>,
}

// SAFETY: see `primitives::countdown_event::CancelTarget` — `Mutex::drop` drains
// its wait list and spins on its scope counter before fields are freed.
unsafe impl Send for CancelTarget {}
unsafe impl Sync for CancelTarget {}

impl CancelableAwaiter for CancelTarget {
    fn cancel(&self) -> bool {
        let mutex = unsafe { &*self.mutex };
        let removed = mutex.wait_queue.remove(&self.coroutine);
        if removed {
            self.coroutine.schedule();
        }
        removed
    }
}

pub struct MutexAwaiter<'a> {
    mutex: &'a Mutex,
    node: Option<Arc<AwaiterNode>>,
}

impl<'a> Future for MutexAwaiter<'a> {
    type Output = Result<ScopedUnlock<'a>, AsyncError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let coroutine = crate::runtime::current_coroutine().expect("await outside a coroutine");

        if let Some(node) = self.node.take() {
            return Poll::Ready(awaiter::on_resume(&coroutine, &node).map(|_| ScopedUnlock {
                mutex: self.mutex,
                coroutine,
            }));
        }

        let _advice = awaiter::on_ready(&coroutine, Kind::Mutex);

        // Held for the rest of this poll: a concurrent `Mutex::drop` waits on
        // this counter before freeing the fields `CancelTarget::cancel`
        // dereferences through a raw pointer.
        let _guard = self.mutex.scope.enter();

        if self.mutex.try_lock(&coroutine) {
            coroutine.mark_running_resumed();
            return Poll::Ready(Ok(ScopedUnlock {
                mutex: self.mutex,
                coroutine,
            }));
        }

        let target: Arc<dyn CancelableAwaiter> = Arc::new(CancelTarget {
            mutex: self.mutex as *const Mutex,
            coroutine: coroutine.clone(),
        });
        let node = awaiter::on_suspend(&coroutine, Kind::Mutex, target);
        node.set_maybe_blocked(true);

        self.mutex.wait_queue.enqueue(coroutine.clone());
        self.mutex.try_claim_from_queue();

        self.node = Some(node);
        Poll::Pending
    }
}

/// RAII guard returned by a successful [`Mutex::lock`]; releases on drop,
/// including on unwind.
pub struct ScopedUnlock<'a> {
    mutex: &'a Mutex,
    coroutine: Arc<Handle>,
}

impl Drop for ScopedUnlock<'_> {
    fn drop(&mut self) {
        let _ = self.mutex.unlock(&self.coroutine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_lock_then_unlock_releases() {
        let mutex = Mutex::new();
        let coro = crate::coroutine::Handle::new(
            crate::options::ResolvedPool::Default,
            "t",
            Box::pin(async {}),
        );
        assert!(mutex.try_lock(&coro));
        assert!(!mutex.try_lock(&coro));
        mutex.unlock(&coro).unwrap();
        assert!(mutex.try_lock(&coro));
    }
}
