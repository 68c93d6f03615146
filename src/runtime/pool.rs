//! Work-stealing thread pool driving coroutines to completion via `poll_once`.
//!
//! Grounded on `examples/redbaron-coio-rs/src/runtime/processor.rs`: each
//! worker owns a local `deque::Worker`/`Stealer` pair, there is a shared
//! injector queue for cross-thread scheduling, and idle workers steal from a
//! random neighbor before parking. The redesign (`SPEC_FULL.md` §0) replaces
//! `resume()`/stackful yielding with `Handle::poll_once` and a condvar park
//! instead of the teacher's per-processor mpsc channel, since there is no
//! fiber context to hand back and forth — see `DESIGN.md`.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, Builder};

use deque::{self, Stealer, Stolen, Worker};
use rand::Rng;

use crate::awaiter::SuspensionAdvice;
use crate::coroutine::Handle;
use crate::fifo::ConcurrentFifoList;
use crate::options::ResolvedPool;

pub(crate) struct Pool {
    kind: ResolvedPool,
    injector: ConcurrentFifoList<Handle>,
    stealers: Vec<Stealer<Arc<Handle>>>,
    parker_lock: Mutex<()>,
    parker_condvar: Condvar,
    idle: AtomicUsize,
    shutdown: AtomicBool,
    chain_allowance: usize,
    remote_work_checks_before_sleep: usize,
    thread_count: usize,
    join_handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl Pool {
    pub(crate) fn start(
        kind: ResolvedPool,
        thread_count: usize,
        chain_allowance: usize,
        remote_work_checks_before_sleep: usize,
    ) -> Arc<Pool> {
        let mut workers = Vec::with_capacity(thread_count);
        let mut stealers = Vec::with_capacity(thread_count);
        for _ in 0..thread_count {
            let (worker, stealer) = deque::new::<Arc<Handle>>();
            stealers.push(stealer);
            workers.push(worker);
        }

        let pool = Arc::new(Pool {
            kind,
            injector: ConcurrentFifoList::new(),
            // Background workers never steal from each other (`spec.md`
            // §4.6 `noLocalWork`): all submissions and pickups go through
            // the shared injector, so an empty stealer list is enough to
            // make the steal loop a no-op for this pool.
            stealers: if kind == ResolvedPool::Background {
                Vec::new()
            } else {
                stealers
            },
            parker_lock: Mutex::new(()),
            parker_condvar: Condvar::new(),
            idle: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            chain_allowance,
            remote_work_checks_before_sleep,
            thread_count,
            join_handles: Mutex::new(Vec::with_capacity(thread_count)),
        });

        let mut handles = Vec::with_capacity(thread_count);
        for (index, worker) in workers.into_iter().enumerate() {
            let pool_ref = pool.clone();
            let handle = Builder::new()
                .name(format!("coropool-{:?}-{}", kind, index))
                .spawn(move || run_worker(pool_ref, worker))
                .expect("failed to spawn coropool worker thread");
            handles.push(handle);
        }
        *pool.join_handles.lock().unwrap() = handles;

        log::trace!("{:?} pool started with {} workers", kind, thread_count);
        pool
    }

    pub(crate) fn kind(&self) -> ResolvedPool {
        self.kind
    }

    pub(crate) fn chain_allowance(&self) -> usize {
        self.chain_allowance
    }

    pub(crate) fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Schedules `handle` onto this pool: the owning worker's local queue if
    /// called from inside one of this pool's own workers, the shared injector
    /// otherwise. Always wakes one parked worker.
    ///
    /// The Background pool has no local queues at all (`spec.md` §4.6
    /// `noLocalWork`): every submission goes straight to the injector so work
    /// is never pinned to the submitting thread.
    pub(crate) fn schedule(&self, handle: Arc<Handle>) {
        let pushed_locally = self.kind != ResolvedPool::Background
            && WORKER.with(|cell| {
                let borrow = cell.borrow();
                match borrow.as_ref() {
                    Some(ctx) if Arc::as_ptr(&ctx.pool) == self as *const Pool => {
                        ctx.local.push(handle.clone());
                        true
                    }
                    _ => false,
                }
            });
        if !pushed_locally {
            self.injector.enqueue(handle);
        }
        self.wake_one();
    }

    fn wake_one(&self) {
        let _guard = self.parker_lock.lock().unwrap();
        self.parker_condvar.notify_one();
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Signals shutdown and wakes every worker so it can observe the flag and
    /// drain its queues (`spec.md` §6: abandoned/cancelled coroutines at
    /// shutdown, not panics).
    pub(crate) fn shutdown(&self) {
        log::debug!("{:?} pool shutting down", self.kind);
        self.shutdown.store(true, Ordering::Release);
        let _guard = self.parker_lock.lock().unwrap();
        self.parker_condvar.notify_all();
    }

    pub(crate) fn join(&self) {
        let handles = std::mem::take(&mut *self.join_handles.lock().unwrap());
        for handle in handles {
            let _ = handle.join();
        }
    }
}

struct WorkerContext {
    pool: Arc<Pool>,
    local: Worker<Arc<Handle>>,
    chain_count: Cell<usize>,
}

thread_local! {
    static WORKER: RefCell<Option<WorkerContext>> = RefCell::new(None);
    static CURRENT_COROUTINE: RefCell<Option<Arc<Handle>>> = RefCell::new(None);
}

pub(crate) fn current_coroutine() -> Option<Arc<Handle>> {
    CURRENT_COROUTINE.with(|cell| cell.borrow().clone())
}

pub(crate) fn current_pool_kind() -> Option<ResolvedPool> {
    WORKER.with(|cell| cell.borrow().as_ref().map(|ctx| ctx.pool.kind()))
}

pub(crate) fn shutdown_requested() -> bool {
    WORKER.with(|cell| {
        cell.borrow()
            .as_ref()
            .map(|ctx| ctx.pool.shutdown_requested())
            .unwrap_or(false)
    })
}

/// Consumes one unit of this worker's chained-execution allowance
/// (`spec.md` §4.6): a coroutine that keeps resolving synchronously and
/// re-polling without yielding to the scheduler must eventually be forced
/// back onto a queue so neighbors get a turn.
pub(crate) fn consume_chain_allowance() -> SuspensionAdvice {
    WORKER.with(|cell| {
        let borrow = cell.borrow();
        match borrow.as_ref() {
            None => SuspensionAdvice::MaySuspend,
            Some(ctx) => {
                let next = ctx.chain_count.get() + 1;
                if next >= ctx.pool.chain_allowance() {
                    ctx.chain_count.set(0);
                    SuspensionAdvice::ShouldSuspend
                } else {
                    ctx.chain_count.set(next);
                    SuspensionAdvice::MaySuspend
                }
            }
        }
    })
}

/// Blocks the calling (non-worker) thread until this pool's run queues are
/// empty and every worker is parked — used by `ThreadPool::wait_for_idle` in
/// tests and graceful-shutdown sequencing.
pub(crate) fn wait_for_idle(pool: &Pool, worker_count: usize) {
    use crate::spin::SpinWait;
    let mut spin = SpinWait::new();
    loop {
        let quiescent = pool.idle.load(Ordering::Acquire) >= worker_count
            && pool.injector.is_empty();
        if quiescent {
            return;
        }
        spin.spin_once();
    }
}

fn run_worker(pool: Arc<Pool>, local: Worker<Arc<Handle>>) {
    let stealers = pool.stealers.clone();
    WORKER.with(|cell| {
        *cell.borrow_mut() = Some(WorkerContext {
            pool: pool.clone(),
            local,
            chain_count: Cell::new(0),
        });
    });

    let mut rng = rand::thread_rng();
    log::trace!("{:?} worker entering run loop", pool.kind());

    'outer: loop {
        if pool.shutdown_requested() {
            break 'outer;
        }

        if pool.kind() != ResolvedPool::Background {
            let work = WORKER.with(|cell| cell.borrow().as_ref().unwrap().local.pop());
            if let Some(coro) = work {
                run_one(&coro);
                continue 'outer;
            }
        }

        if let Some(coro) = try_remote_work(&pool, &stealers, &mut rng) {
            run_one(&coro);
            continue 'outer;
        }

        // Interleave a bounded number of spin-and-recheck passes with the
        // actual park (`spec.md` §4.6 step 2): a worker that goes straight to
        // sleep on the first empty look risks parking just as work lands.
        let mut found = None;
        let mut spin = crate::spin::SpinWait::new();
        for _ in 0..pool.remote_work_checks_before_sleep {
            if pool.shutdown_requested() {
                continue 'outer;
            }
            if let Some(coro) = try_remote_work(&pool, &stealers, &mut rng) {
                found = Some(coro);
                break;
            }
            spin.spin_once();
        }
        if let Some(coro) = found {
            run_one(&coro);
            continue 'outer;
        }

        park_until_woken_or_shutdown(&pool);
    }

    log::trace!("{:?} worker exiting run loop", pool.kind());
    WORKER.with(|cell| *cell.borrow_mut() = None);
}

/// Looks for work that isn't in this worker's own local queue: the shared
/// injector first, then a random-started round over every stealer. Returns
/// `None` if both come up empty; the Background pool's empty `stealers` list
/// makes the steal half a no-op there (`spec.md` §4.6 `noLocalWork`).
fn try_remote_work(
    pool: &Pool,
    stealers: &[Stealer<Arc<Handle>>],
    rng: &mut rand::rngs::ThreadRng,
) -> Option<Arc<Handle>> {
    if let Some(coro) = pool.injector.dequeue() {
        return Some(coro);
    }

    if stealers.is_empty() {
        return None;
    }

    let start = rng.gen_range(0..stealers.len());
    for offset in 0..stealers.len() {
        let idx = (start + offset) % stealers.len();
        if let Stolen::Data(coro) = stealers[idx].steal() {
            log::trace!("{:?} worker stole {:?}", pool.kind(), coro);
            return Some(coro);
        }
    }
    None
}

/// Wakes `handle`: if the calling thread is a worker with chained-execution
/// budget left (`spec.md` §4.6 "chained execution", P7), polls it inline on
/// this thread instead of round-tripping through a run queue and a park/wake.
/// Falls back to an ordinary [`Pool::schedule`] when there's no worker
/// context, the budget is exhausted, or the coroutine belongs to a different
/// pool than the caller's.
///
/// `Handle::poll_once` doesn't itself touch `CURRENT_COROUTINE` — only
/// `run_one` does — so the inline poll here has to save and restore it by
/// hand, otherwise `current_coroutine()` calls made from inside the chained
/// coroutine's own poll would resolve to the caller's handle instead.
pub(crate) fn schedule_or_chain(handle: Arc<Handle>) {
    let chained = WORKER.with(|cell| {
        let borrow = cell.borrow();
        let ctx = match borrow.as_ref() {
            Some(ctx) => ctx,
            None => return false,
        };
        if ctx.pool.kind() != handle.pool() {
            return false;
        }
        if consume_chain_allowance() != SuspensionAdvice::MaySuspend {
            return false;
        }
        let previous = CURRENT_COROUTINE.with(|cell| cell.replace(Some(handle.clone())));
        let _ = handle.poll_once();
        CURRENT_COROUTINE.with(|cell| *cell.borrow_mut() = previous);
        true
    });

    if !chained {
        let pool = super::pool_for(handle.pool());
        pool.schedule(handle);
    }
}

fn park_until_woken_or_shutdown(pool: &Pool) {
    pool.idle.fetch_add(1, Ordering::AcqRel);
    let guard = pool.parker_lock.lock().unwrap();
    let _ = pool
        .parker_condvar
        .wait_timeout(guard, std::time::Duration::from_millis(50))
        .unwrap();
    pool.idle.fetch_sub(1, Ordering::AcqRel);
}

fn run_one(coro: &Arc<Handle>) {
    CURRENT_COROUTINE.with(|cell| *cell.borrow_mut() = Some(coro.clone()));
    let _ = coro.poll_once();
    CURRENT_COROUTINE.with(|cell| *cell.borrow_mut() = None);
}
