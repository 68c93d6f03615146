//! Adaptive busy-wait helpers (`spec.md` C1).
//!
//! Two instantiations, grounded in `original_source/spin_wait.*` and
//! `async_spin_wait.*`: a synchronous one that yields the OS thread, and an
//! async-aware one with a shorter threshold that yields the runtime instead.

/// Spins, periodically calling `std::thread::yield_now()`. For use outside
/// coroutine bodies (e.g. in the synchronous event wrappers in `sync`).
#[derive(Debug)]
pub struct SpinWait {
    count: u64,
}

const SYNC_YIELD_THRESHOLD: u64 = 16;
const ASYNC_YIELD_THRESHOLD: u64 = 4;

impl Default for SpinWait {
    fn default() -> Self {
        SpinWait { count: 0 }
    }
}

impl SpinWait {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn will_next_spin_yield(&self) -> bool {
        self.count % SYNC_YIELD_THRESHOLD == 0
    }

    #[inline]
    pub fn reset(&mut self) {
        self.count = 0;
    }

    #[inline]
    pub fn spin_once(&mut self) {
        if self.will_next_spin_yield() {
            std::thread::yield_now();
        }
        self.count += 1;
    }
}

/// Spins, periodically calling [`crate::runtime::yield_now`] instead of yielding the
/// OS thread, so that spinning inside a coroutine still lets other coroutines make
/// progress on the same worker.
#[derive(Debug)]
pub struct AsyncSpinWait {
    count: u64,
}

impl Default for AsyncSpinWait {
    fn default() -> Self {
        AsyncSpinWait { count: 0 }
    }
}

impl AsyncSpinWait {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn will_next_spin_yield(&self) -> bool {
        self.count % ASYNC_YIELD_THRESHOLD == 0
    }

    #[inline]
    pub fn reset(&mut self) {
        self.count = 0;
    }

    #[inline]
    pub fn spin_once(&mut self) {
        if self.will_next_spin_yield() {
            crate::runtime::yield_now();
        }
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_every_sync_threshold() {
        let mut sw = SpinWait::new();
        for i in 0..SYNC_YIELD_THRESHOLD {
            assert_eq!(sw.will_next_spin_yield(), i == 0);
            sw.spin_once();
        }
        assert!(sw.will_next_spin_yield());
    }

    #[test]
    fn reset_restarts_cadence() {
        let mut sw = AsyncSpinWait::new();
        sw.spin_once();
        sw.spin_once();
        sw.reset();
        assert!(sw.will_next_spin_yield());
    }
}
