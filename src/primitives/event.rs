//! Binary specialization of [`CountdownEvent`] (`spec.md` §4.4.2).

use std::sync::Arc;

use super::countdown_event::{CountdownEvent, CountdownEventAwaiter};
use crate::sync::ManualResetEvent;

pub struct Event {
    inner: CountdownEvent,
}

impl Event {
    pub fn new(initially_set: bool) -> Self {
        Event {
            inner: CountdownEvent::new(initially_set, 1),
        }
    }

    pub fn signal(&self) {
        debug_assert!((0..=1).contains(&self.inner.count()));
        self.inner.count_down();
    }

    pub fn reset(&self) {
        debug_assert!((0..=1).contains(&self.inner.count()));
        self.inner.count_up();
    }

    pub fn is_signaled(&self) -> bool {
        self.inner.is_zero()
    }

    pub fn is_wait_list_empty(&self) -> bool {
        self.inner.is_wait_list_empty()
    }

    pub fn wait_listed_count(&self) -> usize {
        self.inner.wait_listed_count()
    }

    pub fn enqueue_event(&self, other: &Arc<CountdownEvent>) {
        self.inner.enqueue_countdown(other);
    }

    pub fn enqueue_manual_reset_event(&self, event: Arc<ManualResetEvent>) {
        self.inner.enqueue_manual_reset_event(event);
    }

    pub fn wait(&self) -> CountdownEventAwaiter<'_> {
        self.inner.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_matches_constructor_argument() {
        assert!(Event::new(true).is_signaled());
        assert!(!Event::new(false).is_signaled());
    }

    #[test]
    fn signal_then_reset_round_trips() {
        let event = Event::new(false);
        event.signal();
        assert!(event.is_signaled());
        event.reset();
        assert!(!event.is_signaled());
    }
}
