//! Blocking (non-coroutine) synchronization primitives (`spec.md` §4.3 / C3).
//!
//! These wrap `std::sync::{Mutex, Condvar}` and exist for two purposes: giving
//! ordinary OS threads a way to block on coroutine completion (`SyncTask`),
//! and serving as proxy targets that async primitives can signal into from
//! coroutine context.

mod auto_reset_countdown_event;
mod auto_reset_event;
mod manual_reset_event;

pub use auto_reset_countdown_event::AutoResetCountdownEvent;
pub use auto_reset_event::AutoResetEvent;
pub use manual_reset_event::ManualResetEvent;
