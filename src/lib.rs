//! A work-stealing coroutine runtime: async wait primitives, three task
//! laziness families, and a two-pool scheduler.
//!
//! A coroutine is any `async` block or function spawned through one of the
//! [`task`] families. It suspends at [`primitives`] await points instead of
//! blocking its worker thread, and is driven to completion by a
//! [`runtime`] worker polling its [`Future`](std::future::Future) to
//! `Ready`. See `SPEC_FULL.md` for the full design and `DESIGN.md` for where
//! each piece is grounded.

pub mod awaiter;
pub mod coroutine;
pub mod error;
mod fifo;
pub mod options;
pub mod primitives;
pub mod runtime;
mod spin;
pub mod sync;
pub mod task;

pub use coroutine::Handle as CoroutineHandle;
pub use error::{AsyncError, Result};
pub use options::{PoolOptions, ThreadPoolKind};
