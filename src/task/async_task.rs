//! Eagerly-started task (`spec.md` C7 / "Supplemented features" — `AsyncTask<T>`).
//!
//! Grounded on `original_source/task/async_task.hpp`: scheduled the instant it
//! is constructed, independent of whether or when anyone awaits it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::coroutine::Status;
use crate::error::AsyncError;
use crate::options::ResolvedPool;

use super::core::TaskCore;

pub struct AsyncTask<T> {
    core: TaskCore<T>,
}

impl<T: Send + 'static> AsyncTask<T> {
    pub fn spawn(pool: ResolvedPool, body: impl Future<Output = T> + Send + 'static) -> AsyncTask<T> {
        AsyncTask { core: TaskCore::spawn(pool, "async_task", body, true) }
    }

    pub fn spawn_default(body: impl Future<Output = T> + Send + 'static) -> AsyncTask<T> {
        Self::spawn(ResolvedPool::Default, body)
    }

    pub fn spawn_background(body: impl Future<Output = T> + Send + 'static) -> AsyncTask<T> {
        Self::spawn(ResolvedPool::Background, body)
    }

    pub fn is_done(&self) -> bool {
        self.core.is_done()
    }

    pub fn cancel(&self) {
        self.core.cancel();
    }

    pub fn status(&self) -> Status {
        self.core.status()
    }

    pub fn is_cancelled(&self) -> bool {
        self.core.is_cancelled()
    }

    pub fn set_cancel_abandoned(&self, value: bool) {
        self.core.set_cancel_abandoned(value);
    }
}

impl<T: Send + 'static> Future for AsyncTask<T> {
    type Output = Result<T, AsyncError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // SAFETY: see `Task::poll` — no self-referential fields.
        let this = unsafe { self.get_unchecked_mut() };
        this.core.poll(cx)
    }
}
