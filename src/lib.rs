//! # Keystate
//!
//! Keyed shared state for UI bindings and other in-process consumers.
//!
//! A [`SharedState`] engine holds one value per key and lets any number of
//! subscribers follow either the whole value or a selected slice of it.
//!
//! ## Writes
//!
//! Every write runs through a fixed pipeline:
//! - **Middleware** - per-key interceptors that may transform or veto the value
//! - **Commit** - objects merge shallowly onto the previous object, anything
//!   else replaces it
//! - **Persist** - keys bound to a storage backend are written through
//! - **Publish** - subscribers are notified on the next tick
//!
//! ## Notifications
//!
//! Notifications never run inside the write. Writes to one key within a tick
//! collapse into a single notification carrying the latest value, and a
//! selector subscriber only hears about changes to its slice.
//!
//! ## Hydration
//!
//! [`SharedState::snapshot`] captures every key so a fresh engine (for
//! instance on the client after server rendering) can be seeded with
//! [`SharedState::hydrate`] before its first read.

pub mod config;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod persistence;
pub mod pubsub;
pub mod scheduler;
pub mod store;
pub mod value;

mod sync;

// Re-export main types for convenience
pub use config::{EngineConfig, TickMode};
pub use engine::{CreateOptions, EngineBuilder, SharedState};
pub use error::{Error, Result};
pub use middleware::Next;
pub use persistence::{BackendKind, FileStorage, MemoryStorage, StorageBackend};
pub use pubsub::{Subscription, SubscriptionGuard, SubscriptionHandle};
#[cfg(feature = "tokio")]
pub use scheduler::TokioDriver;
pub use scheduler::{ManualDriver, Tick, TickDriver};
pub use store::{Snapshot, StateKey};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        let state = SharedState::new();
        let key: StateKey<i32> = StateKey::new("answer");
        state.create(&key, 0, CreateOptions::default()).unwrap();
        assert_eq!(state.get(&key).unwrap(), 0);
        state.set(&key, 42).unwrap();
        assert_eq!(state.get(&key).unwrap(), 42);
    }
}
