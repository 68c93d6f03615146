//! Shared plumbing behind [`super::task::Task`], [`super::async_task::AsyncTask`]
//! and [`super::sync_task::SyncTask`]: a coroutine plus a single-assignment
//! result slot plus the await-my-completion protocol.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::awaiter::{self, AwaiterNode, CancelableAwaiter, Kind, SuspensionAdvice};
use crate::coroutine::{Handle, Status};
use crate::error::AsyncError;
use crate::options::ResolvedPool;
use crate::primitives::Value;

pub(crate) struct TaskCore<T> {
    handle: Arc<Handle>,
    value: Arc<Value<Result<T, AsyncError>>>,
    node: Option<Arc<AwaiterNode>>,
    started: bool,
}

impl<T: Send + 'static> TaskCore<T> {
    /// Builds the coroutine and its result slot. If `schedule_now` the
    /// coroutine is placed on `pool`'s run queue immediately (`AsyncTask`,
    /// `SyncTask`); otherwise it stays dormant until first polled (`Task`,
    /// the lazy family — `spec.md` "Supplemented features").
    pub(crate) fn spawn(
        pool: ResolvedPool,
        name: &'static str,
        fut: impl Future<Output = T> + Send + 'static,
        schedule_now: bool,
    ) -> Self {
        let value: Arc<Value<Result<T, AsyncError>>> = Arc::new(Value::new());
        let value_writer = value.clone();
        let body: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            let result = fut.await;
            value_writer.set(Ok(result));
        });
        let handle = Handle::new(pool, name, body);
        if schedule_now {
            if let Some(owner) = crate::runtime::current_coroutine() {
                owner.set_owner(&handle);
            }
            handle.schedule();
        }
        TaskCore { handle, value, node: None, started: schedule_now }
    }

    pub(crate) fn handle(&self) -> &Arc<Handle> {
        &self.handle
    }

    pub(crate) fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    pub(crate) fn cancel(&self) {
        self.handle.cancel();
    }

    /// Current coroutine status (`spec.md` §6 task operations).
    pub(crate) fn status(&self) -> Status {
        self.handle.status()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    pub(crate) fn set_cancel_abandoned(&self, value: bool) {
        self.handle.set_cancel_abandoned(value);
    }

    /// Drives the await-my-completion protocol (`spec.md` C5). Reused
    /// verbatim by `Task`, `AsyncTask` and `SyncTask`'s `Future` impls.
    pub(crate) fn poll(&mut self, _cx: &mut Context<'_>) -> Poll<Result<T, AsyncError>> {
        let coroutine = crate::runtime::current_coroutine().expect("await outside a coroutine");

        if let Some(node) = self.node.take() {
            return Poll::Ready(match awaiter::on_resume(&coroutine, &node) {
                Ok(()) => self.value.take(),
                Err(e) => Err(e),
            });
        }

        if !self.started {
            self.started = true;
            coroutine.set_owner(&self.handle);
            self.handle.schedule();
        }

        let advice = awaiter::on_ready(&coroutine, Kind::Task);
        if advice == SuspensionAdvice::ShouldNotSuspend || self.handle.completion_event.is_zero() {
            coroutine.mark_running_resumed();
            return Poll::Ready(self.value.take());
        }

        let target: Arc<dyn CancelableAwaiter> = Arc::new(TaskCancelTarget {
            handle: self.handle.clone(),
            coroutine: coroutine.clone(),
        });
        let node = awaiter::on_suspend(&coroutine, Kind::Task, target);
        node.set_maybe_blocked(true);

        let enqueued = self.handle.completion_event.enqueue_waiting(coroutine.clone());
        node.set_maybe_blocked(enqueued);
        if !enqueued {
            coroutine.mark_running_resumed();
            return Poll::Ready(match awaiter::on_resume(&coroutine, &node) {
                Ok(()) => self.value.take(),
                Err(e) => Err(e),
            });
        }

        self.node = Some(node);
        Poll::Pending
    }
}

/// `spec.md` §4.7/§7: a task whose owner opted into `cancelAbandoned` gets
/// cancelled the moment its last handle is dropped while still running,
/// instead of leaking a coroutine nobody can ever observe again.
impl<T> Drop for TaskCore<T> {
    fn drop(&mut self) {
        if self.handle.should_cancel_abandoned() && !self.handle.is_done() {
            self.handle.cancel();
            self.handle.mark_abandoned();
        }
    }
}

struct TaskCancelTarget {
    handle: Arc<Handle>,
    coroutine: Arc<Handle>,
}

impl CancelableAwaiter for TaskCancelTarget {
    fn cancel(&self) -> bool {
        let removed = self.handle.completion_event.remove(&self.coroutine);
        if removed {
            self.coroutine.schedule();
        }
        removed
    }
}
