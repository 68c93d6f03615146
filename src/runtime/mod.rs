//! The runtime: two work-stealing pools (default, background) and the
//! thread-local glue every awaiter and coroutine calls into (`spec.md` C8).
//!
//! Grounded on `examples/redbaron-coio-rs/src/scheduler.rs` and
//! `.../processor.rs` for the two-pool-plus-worker-threads shape; rebuilt
//! around `Handle::poll_once` instead of fiber `resume()` per the redesign in
//! `SPEC_FULL.md` §0.

mod pool;
mod waker;

use std::sync::{Arc, OnceLock};
use std::task::Waker;

use crate::awaiter::SuspensionAdvice;
use crate::coroutine::Handle;
use crate::options::{PoolOptions, ResolvedPool};

use pool::Pool;

struct Runtime {
    default_pool: Arc<Pool>,
    background_pool: Arc<Pool>,
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| build(PoolOptions::default()))
}

fn build(options: PoolOptions) -> Runtime {
    log::debug!(
        "starting coropool runtime: default={} background={} chain_allowance={}",
        options.default_pool_threads,
        options.background_pool_threads,
        options.max_chained_execution_allowance
    );
    Runtime {
        default_pool: Pool::start(
            ResolvedPool::Default,
            options.default_pool_threads,
            options.max_chained_execution_allowance,
            options.remote_work_checks_before_sleep,
        ),
        background_pool: Pool::start(
            ResolvedPool::Background,
            options.background_pool_threads,
            options.max_chained_execution_allowance,
            options.remote_work_checks_before_sleep,
        ),
    }
}

fn pool_for(kind: ResolvedPool) -> &'static Arc<Pool> {
    let runtime = runtime();
    match kind {
        ResolvedPool::Default => &runtime.default_pool,
        ResolvedPool::Background => &runtime.background_pool,
    }
}

/// Explicit initialization with non-default tunables (`spec.md` §4.6
/// configuration). Must be called before the first coroutine is spawned;
/// returns `false` if the runtime was already initialized (including
/// implicitly, by a prior spawn using defaults).
pub fn init(options: PoolOptions) -> bool {
    let mut initialized = false;
    RUNTIME.get_or_init(|| {
        initialized = true;
        build(options)
    });
    initialized
}

/// Requests shutdown of both pools: every worker observes the flag, drains
/// its queues, and cancels/abandons whatever coroutines it was running
/// (`spec.md` §6 — shutdown produces `ShutdownCancelled`, not a panic).
pub fn shutdown() {
    if let Some(runtime) = RUNTIME.get() {
        log::debug!("coropool runtime shutdown requested");
        runtime.default_pool.shutdown();
        runtime.background_pool.shutdown();
    }
}

/// Blocks until both pools' workers are joined. Only meaningful after
/// [`shutdown`].
pub fn join() {
    if let Some(runtime) = RUNTIME.get() {
        runtime.default_pool.join();
        runtime.background_pool.join();
    }
}

/// Blocks the calling thread until both pools are quiescent (empty queues,
/// every worker parked). Intended for tests and graceful-shutdown sequencing,
/// not for coroutine code.
pub fn wait_for_idle() {
    let runtime = runtime();
    pool::wait_for_idle(&runtime.default_pool, runtime.default_pool.thread_count());
    pool::wait_for_idle(&runtime.background_pool, runtime.background_pool.thread_count());
}

pub(crate) fn schedule(handle: Arc<Handle>) {
    let pool = pool_for(handle.pool());
    pool.schedule(handle);
}

pub(crate) fn schedule_or_chain(handle: Arc<Handle>) {
    pool::schedule_or_chain(handle);
}

pub(crate) fn current_coroutine() -> Option<Arc<Handle>> {
    pool::current_coroutine()
}

pub(crate) fn current_pool_kind() -> Option<ResolvedPool> {
    pool::current_pool_kind()
}

pub(crate) fn shutdown_requested() -> bool {
    pool::shutdown_requested()
}

pub(crate) fn consume_chain_allowance() -> SuspensionAdvice {
    pool::consume_chain_allowance()
}

pub(crate) fn waker_for(handle: Arc<Handle>) -> Waker {
    waker::waker_for(handle)
}

/// Cooperative OS-thread yield used by [`crate::spin::AsyncSpinWait`]. A true
/// coroutine suspension mid-spin would require restructuring the spin loop
/// itself as an awaiter, which `original_source/event/async_spin_wait.cpp`
/// does not do either — see `DESIGN.md`.
pub(crate) fn yield_now() {
    std::thread::yield_now();
}
