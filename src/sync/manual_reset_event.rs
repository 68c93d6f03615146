//! Blocking manual-reset event over `std::sync::{Mutex, Condvar}`.
//!
//! Grounded on `original_source/event/sync_manual_reset_event.{hpp,cpp}`. Used
//! by synchronous callers (`SyncTask::get`) and as a proxy target for async
//! primitives signaling completion into blocking code (`spec.md` §6.3).

use std::sync::{Condvar, Mutex};

pub struct ManualResetEvent {
    state: Mutex<bool>,
    condvar: Condvar,
}

impl ManualResetEvent {
    pub fn new(initially_set: bool) -> Self {
        ManualResetEvent {
            state: Mutex::new(initially_set),
            condvar: Condvar::new(),
        }
    }

    pub fn set(&self) {
        let mut signaled = self.state.lock().expect("manual reset event poisoned");
        *signaled = true;
        self.condvar.notify_all();
    }

    pub fn reset(&self) {
        let mut signaled = self.state.lock().expect("manual reset event poisoned");
        *signaled = false;
    }

    pub fn is_set(&self) -> bool {
        *self.state.lock().expect("manual reset event poisoned")
    }

    pub fn wait(&self) {
        let guard = self.state.lock().expect("manual reset event poisoned");
        let _guard = self
            .condvar
            .wait_while(guard, |signaled| !*signaled)
            .expect("manual reset event poisoned");
    }
}

impl Default for ManualResetEvent {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn set_before_wait_does_not_block() {
        let event = ManualResetEvent::new(true);
        event.wait();
    }

    #[test]
    fn wait_unblocks_on_set_from_another_thread() {
        let event = Arc::new(ManualResetEvent::new(false));
        let waiter = {
            let event = event.clone();
            thread::spawn(move || event.wait())
        };
        thread::sleep(Duration::from_millis(20));
        event.set();
        waiter.join().unwrap();
    }
}
