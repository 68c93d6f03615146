//! Pool selection and tunables.
//!
//! `spec.md` §1 calls out worker-thread counts as configuration, not design; this
//! module is where that configuration lives, with defaults matching §4.6 exactly.

/// Which pool a task is bound to. `Current` resolves at construction time to the
/// creating coroutine's pool, or `Default` if there is no current coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadPoolKind {
    Current,
    Default,
    Background,
}

impl ThreadPoolKind {
    /// Resolves `Current` against whatever pool is running on this worker thread.
    pub(crate) fn resolve(self) -> ResolvedPool {
        match self {
            ThreadPoolKind::Current => crate::runtime::current_pool_kind().unwrap_or(ResolvedPool::Default),
            ThreadPoolKind::Default => ResolvedPool::Default,
            ThreadPoolKind::Background => ResolvedPool::Background,
        }
    }
}

/// `ThreadPoolKind` with `Current` already resolved; this is what `Coroutine`
/// records actually store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedPool {
    Default,
    Background,
}

/// The kind of coroutine-owning record, used only to tag promises for debugging
/// and to select the `CanDestroyNotStarted` destruction rule (`spec.md` §4.1/§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Task,
    AsyncTask,
    SyncTask,
    SimpleTask,
}

/// Builder for scheduler tunables. Defaults reproduce `spec.md` §4.6's numbers.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub(crate) default_pool_threads: usize,
    pub(crate) background_pool_threads: usize,
    pub(crate) max_chained_execution_allowance: usize,
    pub(crate) remote_work_checks_before_sleep: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            default_pool_threads: num_cpus::get().min(10).max(1),
            background_pool_threads: 5,
            max_chained_execution_allowance: 100,
            remote_work_checks_before_sleep: 32,
        }
    }
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_pool_threads(mut self, n: usize) -> Self {
        self.default_pool_threads = n.max(1);
        self
    }

    pub fn background_pool_threads(mut self, n: usize) -> Self {
        self.background_pool_threads = n.max(1);
        self
    }

    pub fn max_chained_execution_allowance(mut self, n: usize) -> Self {
        self.max_chained_execution_allowance = n;
        self
    }
}
