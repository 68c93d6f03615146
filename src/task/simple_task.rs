//! Fire-and-forget task family (`spec.md` C7): no result, no waiter.
//!
//! Grounded on `original_source/task/simple_task.hpp`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::coroutine::Handle;
use crate::options::ResolvedPool;

/// A spawned coroutine whose completion nobody awaits. Dropping the handle
/// does not cancel it; use [`SimpleTask::cancel`] explicitly.
pub struct SimpleTask {
    handle: Arc<Handle>,
}

impl SimpleTask {
    pub fn spawn(pool: ResolvedPool, body: impl Future<Output = ()> + Send + 'static) -> SimpleTask {
        let boxed: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(body);
        let handle = Handle::new(pool, "simple_task", boxed);
        handle.schedule();
        SimpleTask { handle }
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }
}

/// Spawns a coroutine that runs `f` to completion and nothing else, used by
/// async primitives that need to run ordinary closures once a condition is met
/// (`CountdownEvent::enqueue_countdown`, `enqueue_manual_reset_event`). Unlike
/// `SimpleTask::spawn`, this does not schedule the coroutine — the caller
/// decides when it becomes runnable (immediately, or once enqueued on a
/// primitive's wait list).
pub(crate) fn spawn_proxy(f: impl FnOnce() + Send + 'static) -> Arc<Handle> {
    let boxed: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move { f() });
    Handle::new(ResolvedPool::Default, "proxy", boxed)
}
