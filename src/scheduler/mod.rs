//! Batched notification scheduling.
//!
//! Publishes are parked in a per-key pending set and run together when the
//! host's [`TickDriver`] fires the next tick, so a burst of writes to one key
//! produces a single notification pass.

mod driver;
mod scheduler;

#[cfg(feature = "tokio")]
pub use driver::TokioDriver;
pub use driver::{ManualDriver, Tick, TickDriver};
pub use scheduler::{BatchScheduler, FlushAction};
