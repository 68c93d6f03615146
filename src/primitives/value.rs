//! Single-assignment value-or-error cell backed by an [`Event`] (`spec.md` §4.4.6).
//!
//! Grounded on `original_source/event/async_value.hpp`: a producer calls
//! [`Value::set`] (or [`Value::set_error`]) exactly once; any number of
//! consumers `await` the same [`Value`] and observe the same result.

use std::cell::UnsafeCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use crate::error::AsyncError;

use super::event::Event;

pub struct Value<T> {
    event: Event,
    slot: UnsafeCell<Option<Result<T, AsyncError>>>,
    assigned: AtomicBool,
}

// SAFETY: `slot` is written exactly once, guarded by the `assigned`
// compare-exchange below, before `event.signal()` makes it visible to
// readers; readers only ever read, never write.
unsafe impl<T: Send> Send for Value<T> {}
unsafe impl<T: Send> Sync for Value<T> {}

impl<T> Value<T> {
    pub fn new() -> Self {
        Value {
            event: Event::new(false),
            slot: UnsafeCell::new(None),
            assigned: AtomicBool::new(false),
        }
    }

    pub fn is_set(&self) -> bool {
        self.event.is_signaled()
    }

    /// Assigns the value. Panics if called more than once (`spec.md` I-series
    /// single-assignment invariant for this primitive).
    pub fn set(&self, value: T) {
        self.assign(Ok(value));
    }

    pub fn set_error(&self, error: AsyncError) {
        self.assign(Err(error));
    }

    fn assign(&self, result: Result<T, AsyncError>) {
        if self
            .assigned
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            panic!("Value assigned more than once");
        }
        // SAFETY: exclusive writer, guaranteed by the CAS above.
        unsafe {
            *self.slot.get() = Some(result);
        }
        self.event.signal();
    }

    /// Awaits assignment and returns a clone of the stored result.
    pub fn get(&self) -> ValueAwaiter<'_, T>
    where
        T: Clone,
    {
        ValueAwaiter { value: self, wait: self.event.wait() }
    }

    /// Takes the stored result, leaving the slot empty. Callers must only use
    /// this once the backing event is known to be signaled (task result
    /// plumbing owns single-consumer access; it does not need `T: Clone`).
    pub(crate) fn take(&self) -> Result<T, AsyncError> {
        // SAFETY: only called after `self.event.is_signaled()`, which happens
        // strictly after `assign` finishes writing `slot`.
        unsafe { (*self.slot.get()).take() }.expect("value not assigned")
    }
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ValueAwaiter<'a, T> {
    value: &'a Value<T>,
    wait: super::countdown_event::CountdownEventAwaiter<'a>,
}

impl<T: Clone> Future for ValueAwaiter<'_, T> {
    type Output = Result<T, AsyncError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // SAFETY: `wait` is a plain struct field, never itself pinned-projected
        // elsewhere; structural pinning is sound because `ValueAwaiter` is not
        // `Unpin`-sensitive beyond forwarding to `wait`.
        let this = unsafe { self.get_unchecked_mut() };
        let wait = unsafe { Pin::new_unchecked(&mut this.wait) };
        match wait.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {
                // SAFETY: the event only signals after `assign` completes its write.
                let slot = unsafe { &*this.value.slot.get() };
                Poll::Ready(slot.clone().expect("value signaled without assignment"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_marks_signaled() {
        let value: Value<i32> = Value::new();
        assert!(!value.is_set());
        value.set(7);
        assert!(value.is_set());
    }

    #[test]
    #[should_panic(expected = "assigned more than once")]
    fn double_set_panics() {
        let value: Value<i32> = Value::new();
        value.set(1);
        value.set(2);
    }
}
