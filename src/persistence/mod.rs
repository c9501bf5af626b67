//! Durable storage of key values.
//!
//! Each persisted key is bound to a [`BackendKind`]. The engine supplies the
//! concrete backends; a kind with no backend (for instance local storage on a
//! server) silently turns persistence off for its keys.

mod adapter;
mod backend;
mod file;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use adapter::PersistenceAdapter;
pub use backend::{MemoryStorage, StorageBackend};
pub use file::FileStorage;

/// Which storage a key persists to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Survives restarts.
    Local,
    /// Lives as long as the session.
    Session,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => f.write_str("local"),
            BackendKind::Session => f.write_str("session"),
        }
    }
}
