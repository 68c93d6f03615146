//! [`std::task::Waker`] backed by a coroutine [`Handle`] (`spec.md` §0 redesign note).
//!
//! Waking reschedules the coroutine onto its pool exactly as the original's
//! `resume()` call would from a callback; cloning/dropping only manipulates
//! the `Arc` refcount.

use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

use crate::coroutine::Handle;

const VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop);

pub(crate) fn waker_for(handle: Arc<Handle>) -> Waker {
    let raw = Arc::into_raw(handle) as *const ();
    unsafe { Waker::from_raw(RawWaker::new(raw, &VTABLE)) }
}

unsafe fn clone(data: *const ()) -> RawWaker {
    let handle = unsafe { Arc::from_raw(data as *const Handle) };
    let cloned = handle.clone();
    std::mem::forget(handle);
    RawWaker::new(Arc::into_raw(cloned) as *const (), &VTABLE)
}

unsafe fn wake(data: *const ()) {
    let handle = unsafe { Arc::from_raw(data as *const Handle) };
    handle.schedule();
}

unsafe fn wake_by_ref(data: *const ()) {
    let handle = unsafe { Arc::from_raw(data as *const Handle) };
    handle.schedule();
    std::mem::forget(handle);
}

unsafe fn drop(data: *const ()) {
    let handle = unsafe { Arc::from_raw(data as *const Handle) };
    std::mem::drop(handle);
}
