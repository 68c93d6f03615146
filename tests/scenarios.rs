//! End-to-end scenarios (`spec.md` §8), run against the real runtime.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use coropool::error::AsyncError;
use coropool::primitives::{Barrier, Event, Mutex};
use coropool::task::{AsyncTask, SyncTask};

/// Scenario 1: three worker coroutines rendezvous at a capacity-3 barrier for
/// five rounds; every round must release every party before the next starts.
#[test]
fn barrier_rendezvous_across_rounds() {
    let barrier = Arc::new(Barrier::new(3));
    let rounds_seen = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let barrier = barrier.clone();
            let rounds_seen = rounds_seen.clone();
            SyncTask::spawn_default(async move {
                for _ in 0..5 {
                    rounds_seen.fetch_add(1, Ordering::SeqCst);
                    barrier.arrive_and_wait().await.unwrap();
                }
            })
        })
        .collect();

    for task in tasks {
        task.get().unwrap();
    }
    assert_eq!(rounds_seen.load(Ordering::SeqCst), 15);
}

struct SharedCounter(UnsafeCell<usize>);

// SAFETY: all access is serialized by `Mutex` in the tests below.
unsafe impl Send for SharedCounter {}
unsafe impl Sync for SharedCounter {}

/// Scenario 2: concurrent coroutines incrementing a counter guarded by
/// `Mutex` must never observe a torn update.
#[test]
fn mutex_serializes_concurrent_increments() {
    let mutex = Arc::new(Mutex::new());
    let counter = Arc::new(SharedCounter(UnsafeCell::new(0)));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let mutex = mutex.clone();
            let counter = counter.clone();
            SyncTask::spawn_default(async move {
                for _ in 0..50 {
                    let _guard = mutex.lock().await.unwrap();
                    let slot = unsafe { &mut *counter.0.get() };
                    *slot += 1;
                }
            })
        })
        .collect();

    for task in tasks {
        task.get().unwrap();
    }
    assert_eq!(unsafe { *counter.0.get() }, 400);
}

/// Scenario 3: cancelling a coroutine while it is parked awaiting an `Event`
/// raises `AsyncError::Cancelled` at the await point instead of hanging.
#[test]
fn cancellation_raises_while_awaiting_event() {
    let event = Arc::new(Event::new(false));
    let event_for_waiter = event.clone();

    let waiter = SyncTask::spawn_default(async move { event_for_waiter.wait().await });

    thread::sleep(Duration::from_millis(20));
    waiter.cancel();

    let outcome = waiter.get().unwrap();
    assert!(matches!(outcome, Err(AsyncError::Cancelled)));
}

/// Scenario 4: an `AsyncTask` that nobody awaits, and whose
/// `cancel_abandoned` flag was never set, still runs to completion — being
/// abandoned is not the same as being cancelled (`spec.md` I3).
#[test]
fn abandoned_task_without_cancel_abandoned_still_completes() {
    let done = Arc::new(AtomicUsize::new(0));
    let done_writer = done.clone();

    {
        let _task = AsyncTask::spawn_default(async move {
            done_writer.store(1, Ordering::SeqCst);
        });
        // `_task` is dropped here without ever being awaited or cancelled.
    }

    let mut spins = 0;
    while done.load(Ordering::SeqCst) == 0 && spins < 200 {
        thread::sleep(Duration::from_millis(5));
        spins += 1;
    }
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

/// Scenario 4b: an `AsyncTask` with `cancel_abandoned` armed gets cancelled
/// automatically the moment its last handle drops, even though it was still
/// parked and would otherwise have run forever (`spec.md` §4.7/§7).
#[test]
fn abandoned_task_with_cancel_abandoned_is_cancelled_on_drop() {
    const PENDING: usize = 0;
    const COMPLETED: usize = 1;
    const CANCELLED: usize = 2;

    let event = Arc::new(Event::new(false));
    let outcome = Arc::new(AtomicUsize::new(PENDING));

    let task = {
        let event = event.clone();
        let outcome = outcome.clone();
        AsyncTask::spawn_default(async move {
            match event.wait().await {
                Ok(()) => outcome.store(COMPLETED, Ordering::SeqCst),
                Err(AsyncError::Cancelled) => outcome.store(CANCELLED, Ordering::SeqCst),
                Err(_) => {}
            }
        })
    };
    task.set_cancel_abandoned(true);

    // Let the coroutine actually park on the event before dropping its only
    // handle; otherwise the drop could race a task that hasn't suspended yet.
    let mut spins = 0;
    while event.is_wait_list_empty() && spins < 200 {
        thread::sleep(Duration::from_millis(5));
        spins += 1;
    }
    assert!(!event.is_wait_list_empty(), "task never parked on the event");

    drop(task);

    let mut spins = 0;
    while outcome.load(Ordering::SeqCst) == PENDING && spins < 200 {
        thread::sleep(Duration::from_millis(5));
        spins += 1;
    }
    assert_eq!(outcome.load(Ordering::SeqCst), CANCELLED);
}

/// Scenario 5: destroying a `Barrier` while a coroutine is parked on it
/// cancels that coroutine instead of leaving it parked forever. The raw race
/// itself is exercised at the unit level in `primitives::barrier` (a
/// non-`'static` borrow of a stack `Barrier` cannot escape into a spawned
/// `'static` task, which Rust's borrow checker rejects outright — a stronger
/// guarantee than the original's manual lifetime discipline).
#[test]
fn barrier_wrapped_in_arc_tears_down_cleanly_after_use() {
    let barrier = Arc::new(Barrier::new(1));
    let task = SyncTask::spawn_default({
        let barrier = barrier.clone();
        async move { barrier.arrive_and_wait().await }
    });
    task.get().unwrap().unwrap();
    drop(barrier);
}

/// Scenario 6: a default-pool coroutine spawning and awaiting background-pool
/// work is functionally transparent — the result comes back regardless of
/// which pool actually ran it.
#[test]
fn pool_switching_round_trip() {
    let result = SyncTask::spawn_default(async move {
        AsyncTask::spawn_background(async move { 6 * 7 }).await.unwrap()
    })
    .get()
    .unwrap();
    assert_eq!(result, 42);
}
