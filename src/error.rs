//! Error types for the shared-state engine.

use thiserror::Error;

use crate::persistence::BackendKind;

/// Errors that can occur while reading, writing or configuring shared state.
///
/// Only programmer-misuse conditions reach the caller of a write. Persistence
/// failures are logged by the adapter and never escape it.
#[derive(Debug, Error)]
pub enum Error {
    /// The key was read or written before it was created.
    #[error("no state found for key: {0}")]
    KeyNotFound(String),

    /// The key was created with a different value type.
    #[error("key {key} holds {registered}, not {requested}")]
    TypeMismatch {
        key: String,
        registered: &'static str,
        requested: &'static str,
    },

    /// A value could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No backend of this kind exists in the current context.
    #[error("{0} storage is unavailable")]
    StorageUnavailable(BackendKind),

    /// The backend refused the write because it is full.
    #[error("storage quota of {limit} bytes exceeded writing {key}")]
    QuotaExceeded { key: String, limit: usize },

    /// I/O error from a file-backed storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A middleware aborted the write.
    #[error("middleware aborted write: {0}")]
    Middleware(String),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build the error a middleware returns to abort a write.
    pub fn middleware(reason: impl Into<String>) -> Self {
        Self::Middleware(reason.into())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
