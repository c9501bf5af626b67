use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{BackendKind, StorageBackend};
use crate::error::{Error, Result};
use crate::sync::{read, write};

/// Maps keys to storage backends and moves values in and out of them.
///
/// Nothing here fails loudly: a missing backend, a full backend or an
/// unreadable entry degrades the key to in-memory only and is logged.
pub struct PersistenceAdapter {
    config: RwLock<HashMap<String, BackendKind>>,
    local: Option<Arc<dyn StorageBackend>>,
    session: Option<Arc<dyn StorageBackend>>,
}

impl PersistenceAdapter {
    pub fn new(
        local: Option<Arc<dyn StorageBackend>>,
        session: Option<Arc<dyn StorageBackend>>,
    ) -> Self {
        Self {
            config: RwLock::new(HashMap::new()),
            local,
            session,
        }
    }

    /// An adapter with no backend at all.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    /// Persist `key` to `kind`. The first registration for a key wins.
    ///
    /// Returns `true` if this call registered the key.
    pub fn set_persistence(&self, key: &str, kind: BackendKind) -> bool {
        let mut config = write(&self.config);
        if config.contains_key(key) {
            return false;
        }
        config.insert(key.to_owned(), kind);
        true
    }

    pub fn backend_kind(&self, key: &str) -> Option<BackendKind> {
        read(&self.config).get(key).copied()
    }

    pub fn is_available(&self, kind: BackendKind) -> bool {
        self.backend(kind).is_ok()
    }

    /// Write `value` to the backend configured for `key`, if any.
    pub fn persist_value(&self, key: &str, value: &Value) {
        let Some(kind) = self.backend_kind(key) else {
            return;
        };
        match self.store(key, kind, value) {
            Ok(()) => {}
            Err(Error::StorageUnavailable(_)) => {
                tracing::debug!(key, backend = %kind, "storage unavailable, keeping value in memory");
            }
            Err(error) => {
                tracing::error!(key, backend = %kind, %error, "failed to persist value");
            }
        }
    }

    /// Read the stored value for `key`.
    ///
    /// `None` when the key has no backend, the backend is unavailable, or the
    /// entry is missing or unparsable.
    pub fn get_persisted_value(&self, key: &str) -> Option<Value> {
        let kind = self.backend_kind(key)?;
        match self.load(key, kind) {
            Ok(value) => value,
            Err(Error::StorageUnavailable(_)) => None,
            Err(error) => {
                tracing::error!(key, backend = %kind, %error, "failed to read persisted value");
                None
            }
        }
    }

    fn backend(&self, kind: BackendKind) -> Result<&Arc<dyn StorageBackend>> {
        let backend = match kind {
            BackendKind::Local => self.local.as_ref(),
            BackendKind::Session => self.session.as_ref(),
        };
        backend.ok_or(Error::StorageUnavailable(kind))
    }

    fn store(&self, key: &str, kind: BackendKind, value: &Value) -> Result<()> {
        let backend = self.backend(kind)?;
        let text = serde_json::to_string(value)?;
        backend.set_item(key, &text)
    }

    fn load(&self, key: &str, kind: BackendKind) -> Result<Option<Value>> {
        let Some(text) = self.backend(kind)?.get_item(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                tracing::warn!(key, backend = %kind, %error, "ignoring unparsable persisted value");
                Ok(None)
            }
        }
    }
}
