//! Async wait primitives built on coroutine suspension (`spec.md` §4.4 / C6).

mod scope;

pub mod barrier;
pub mod countdown_event;
pub mod event;
pub mod mutex;
pub mod value;

pub use barrier::Barrier;
pub use countdown_event::CountdownEvent;
pub use event::Event;
pub use mutex::{Mutex, ScopedUnlock};
pub use value::Value;
