//! Intrusive lock-free MPMC FIFO (`spec.md` C2).
//!
//! Single-linked, no sentinel node. Backs both coroutine run queues and each
//! primitive's wait list, reusing whichever intrusive `next` pointer the linked
//! type already carries (`spec.md` §9: "use the coroutine's own next-pointer for
//! queue membership"). The queue takes ownership of an `Arc<T>` while an item is
//! linked in and hands it back on dequeue.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::spin::SpinWait;

/// Implemented by anything that can be a node in a [`ConcurrentFifoList`]. Each
/// linkable type owns exactly one `next` pointer per list it can be a member of.
pub trait Link {
    fn next_ptr(&self) -> &AtomicPtr<Self>
    where
        Self: Sized;
}

pub struct ConcurrentFifoList<T: Link> {
    head: AtomicPtr<T>,
    tail: AtomicPtr<T>,
    len: AtomicUsize,
}

unsafe impl<T: Link + Send + Sync> Send for ConcurrentFifoList<T> {}
unsafe impl<T: Link + Send + Sync> Sync for ConcurrentFifoList<T> {}

impl<T: Link> Default for ConcurrentFifoList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Link> ConcurrentFifoList<T> {
    pub const fn new() -> Self {
        ConcurrentFifoList {
            head: AtomicPtr::new(ptr::null_mut()),
            tail: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
        }
    }

    /// Best-effort size, accurate only absent concurrent mutation. Diagnostics only.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    pub fn enqueue(&self, item: Arc<T>) {
        let raw = Arc::into_raw(item) as *mut T;
        unsafe {
            (*raw).next_ptr().store(ptr::null_mut(), Ordering::Relaxed);
        }

        let prev_tail = self.tail.swap(raw, Ordering::AcqRel);
        if prev_tail.is_null() {
            self.head.store(raw, Ordering::Release);
        } else {
            unsafe {
                (*prev_tail).next_ptr().store(raw, Ordering::Release);
            }
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes and returns the oldest item, or `None` if the queue was empty at
    /// the moment this call claimed (or failed to claim) the head. Under heavy
    /// contention this may transiently report empty while another dequeuer is
    /// mid-detach; it never loses or duplicates an item (see `spec.md` P6).
    pub fn dequeue(&self) -> Option<Arc<T>> {
        loop {
            let old_head = self.head.load(Ordering::Acquire);
            if old_head.is_null() {
                return None;
            }

            if self
                .head
                .compare_exchange_weak(old_head, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Another dequeuer claimed `old_head` first; re-read and retry.
                continue;
            }

            let next = unsafe { (*old_head).next_ptr().load(Ordering::Acquire) };
            if !next.is_null() {
                self.head.store(next, Ordering::Release);
            } else if self
                .tail
                .compare_exchange(old_head, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // A concurrent enqueue already swapped in a new tail and is about
                // to publish the link from `old_head` to it. Spin until it lands.
                let mut spin = SpinWait::new();
                loop {
                    let next = unsafe { (*old_head).next_ptr().load(Ordering::Acquire) };
                    if !next.is_null() {
                        self.head.store(next, Ordering::Release);
                        break;
                    }
                    spin.spin_once();
                }
            }

            self.len.fetch_sub(1, Ordering::Relaxed);
            return Some(unsafe { Arc::from_raw(old_head as *const T) });
        }
    }

    /// Best-effort removal of a specific item, matched by pointer identity.
    /// Rotates up to twice the observed length, dequeuing and re-enqueuing
    /// non-matching items. Returns `false` if `item` was not found — which may
    /// also mean a concurrent dequeue already removed it (`spec.md` §9 Open
    /// Question: callers must not treat this as proof the item was never queued).
    pub fn remove(&self, item: &T) -> bool {
        let target = item as *const T;
        let bound = self.len().saturating_mul(2).max(1);
        let mut scanned = Vec::new();
        let mut found = false;

        for _ in 0..bound {
            match self.dequeue() {
                Some(node) => {
                    if Arc::as_ptr(&node) == target {
                        found = true;
                        break;
                    }
                    scanned.push(node);
                }
                None => break,
            }
        }

        for node in scanned {
            self.enqueue(node);
        }

        found
    }
}

impl<T: Link> Drop for ConcurrentFifoList<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        value: u32,
        next: AtomicPtr<Node>,
    }

    impl Link for Node {
        fn next_ptr(&self) -> &AtomicPtr<Self> {
            &self.next
        }
    }

    fn node(value: u32) -> Arc<Node> {
        Arc::new(Node {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
        })
    }

    #[test]
    fn fifo_order_preserved() {
        let list = ConcurrentFifoList::new();
        list.enqueue(node(1));
        list.enqueue(node(2));
        list.enqueue(node(3));

        assert_eq!(list.dequeue().unwrap().value, 1);
        assert_eq!(list.dequeue().unwrap().value, 2);
        assert_eq!(list.dequeue().unwrap().value, 3);
        assert!(list.dequeue().is_none());
    }

    #[test]
    fn len_tracks_enqueue_dequeue() {
        let list = ConcurrentFifoList::new();
        assert_eq!(list.len(), 0);
        list.enqueue(node(1));
        list.enqueue(node(2));
        assert_eq!(list.len(), 2);
        list.dequeue();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn remove_middle_item() {
        let list = ConcurrentFifoList::new();
        let a = node(1);
        let b = node(2);
        let c = node(3);
        list.enqueue(a.clone());
        list.enqueue(b.clone());
        list.enqueue(c.clone());

        assert!(list.remove(&b));
        assert_eq!(list.dequeue().unwrap().value, 1);
        assert_eq!(list.dequeue().unwrap().value, 3);
        assert!(list.dequeue().is_none());
    }

    #[test]
    fn concurrent_enqueue_dequeue_is_lossless() {
        use std::thread;

        let list = Arc::new(ConcurrentFifoList::new());
        let producers: Vec<_> = (0..4)
            .map(|t| {
                let list = list.clone();
                thread::spawn(move || {
                    for i in 0..250u32 {
                        list.enqueue(node(t * 1000 + i));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let mut drained = 0;
        while list.dequeue().is_some() {
            drained += 1;
        }
        assert_eq!(drained, 1000);
    }
}
