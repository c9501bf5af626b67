//! The keyed value store.
//!
//! Values are held as JSON so any serializable type can live in a slot, while
//! typed [`StateKey`]s and the runtime type registry keep reads and writes of
//! one key consistent.

mod key;
mod snapshot;
mod store;

pub use key::{KeyType, StateKey};
pub use snapshot::Snapshot;
pub use store::StateStore;
