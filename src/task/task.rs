//! Lazily-started task (`spec.md` C7 / "Supplemented features" — `Task<T>`).
//!
//! Grounded on `original_source/task/task.hpp`: the coroutine body does not run
//! until the `Task` is first polled, at which point it is scheduled on its
//! bound pool and the first-poller becomes its owner for destruction gating.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::coroutine::Status;
use crate::error::AsyncError;
use crate::options::ResolvedPool;

use super::core::TaskCore;

pub struct Task<T> {
    core: TaskCore<T>,
}

impl<T: Send + 'static> Task<T> {
    pub fn new(pool: ResolvedPool, body: impl Future<Output = T> + Send + 'static) -> Task<T> {
        Task { core: TaskCore::spawn(pool, "task", body, false) }
    }

    pub fn default_pool(body: impl Future<Output = T> + Send + 'static) -> Task<T> {
        Self::new(ResolvedPool::Default, body)
    }

    pub fn background_pool(body: impl Future<Output = T> + Send + 'static) -> Task<T> {
        Self::new(ResolvedPool::Background, body)
    }

    pub fn is_done(&self) -> bool {
        self.core.is_done()
    }

    pub fn cancel(&self) {
        self.core.cancel();
    }

    /// Current coroutine status (`spec.md` §6 task operations).
    pub fn status(&self) -> Status {
        self.core.status()
    }

    pub fn is_cancelled(&self) -> bool {
        self.core.is_cancelled()
    }

    /// Arms or disarms automatic cancellation on drop while the task is still
    /// running and otherwise unreferenced (`spec.md` §4.7 `cancelAbandoned`).
    pub fn set_cancel_abandoned(&self, value: bool) {
        self.core.set_cancel_abandoned(value);
    }
}

impl<T: Send + 'static> Future for Task<T> {
    type Output = Result<T, AsyncError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // SAFETY: `Task` is not self-referential; `TaskCore` only holds `Arc`s
        // and an `Option<Arc<_>>`, all of which are `Unpin`.
        let this = unsafe { self.get_unchecked_mut() };
        this.core.poll(cx)
    }
}
