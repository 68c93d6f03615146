//! Task families layered on coroutine handles (`spec.md` C7).
//!
//! Three laziness policies share one pool-selection knob
//! ([`crate::options::ResolvedPool`]): [`Task`] defers starting until first
//! polled, [`AsyncTask`] starts immediately, and [`SyncTask`] additionally
//! exposes a blocking `get()` for ordinary OS threads. [`simple_task`] is the
//! fire-and-forget family used both directly and as the proxy mechanism
//! behind `CountdownEvent`'s completion callbacks.

mod async_task;
mod core;
pub mod simple_task;
mod sync_task;
mod task;

pub use async_task::AsyncTask;
pub use simple_task::SimpleTask;
pub use sync_task::SyncTask;
pub use task::Task;

/// Pool-bound aliases matching the original's `Generator`/`DefaultTask`/
/// `BackgroundTask` etc. naming (`SPEC_FULL.md` "Supplemented features").
/// Pool selection here is a constructor argument rather than a type
/// parameter — see `DESIGN.md` for why.
pub type Generator<T> = Task<T>;
pub type DefaultTask<T> = Task<T>;
pub type BackgroundTask<T> = Task<T>;

pub type Async<T> = AsyncTask<T>;
pub type DefaultAsync<T> = AsyncTask<T>;
pub type BackgroundAsync<T> = AsyncTask<T>;

pub type Sync<T> = SyncTask<T>;
pub type DefaultSync<T> = SyncTask<T>;
pub type BackgroundSync<T> = SyncTask<T>;
