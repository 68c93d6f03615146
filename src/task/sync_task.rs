//! Task family gettable from an ordinary OS thread (`spec.md` C7 /
//! "Supplemented features" — `SyncTask<T>`).
//!
//! Grounded on `original_source/task/sync_task.hpp`: bridges coroutine
//! completion to a blocking [`ManualResetEvent`] via the same countdown-event
//! proxy mechanism `CountdownEvent::enqueue_manual_reset_event` uses.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::coroutine::{Handle, Status};
use crate::error::AsyncError;
use crate::options::ResolvedPool;
use crate::primitives::Value;
use crate::sync::ManualResetEvent;

pub struct SyncTask<T> {
    handle: Arc<Handle>,
    value: Arc<Value<Result<T, AsyncError>>>,
    ready: Arc<ManualResetEvent>,
}

impl<T: Send + 'static> SyncTask<T> {
    pub fn spawn(pool: ResolvedPool, fut: impl Future<Output = T> + Send + 'static) -> SyncTask<T> {
        let value: Arc<Value<Result<T, AsyncError>>> = Arc::new(Value::new());
        let value_writer = value.clone();
        let body: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            let result = fut.await;
            value_writer.set(Ok(result));
        });
        let handle = Handle::new(pool, "sync_task", body);
        let ready = Arc::new(ManualResetEvent::new(false));
        handle.completion_event.enqueue_manual_reset_event(ready.clone());
        handle.schedule();
        SyncTask { handle, value, ready }
    }

    pub fn spawn_default(fut: impl Future<Output = T> + Send + 'static) -> SyncTask<T> {
        Self::spawn(ResolvedPool::Default, fut)
    }

    pub fn spawn_background(fut: impl Future<Output = T> + Send + 'static) -> SyncTask<T> {
        Self::spawn(ResolvedPool::Background, fut)
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn status(&self) -> Status {
        self.handle.status()
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    pub fn set_cancel_abandoned(&self, value: bool) {
        self.handle.set_cancel_abandoned(value);
    }

    /// Blocks the calling OS thread until the coroutine completes, then
    /// returns its result. Consumes `self` — a `SyncTask` is gotten once.
    pub fn get(self) -> Result<T, AsyncError> {
        self.ready.wait();
        self.value.take()
    }
}

/// `spec.md` §4.7/§7: same auto-cancel-on-drop contract as `TaskCore` — see
/// `task::core::TaskCore`'s `Drop` impl.
impl<T> Drop for SyncTask<T> {
    fn drop(&mut self) {
        if self.handle.should_cancel_abandoned() && !self.handle.is_done() {
            self.handle.cancel();
            self.handle.mark_abandoned();
        }
    }
}
