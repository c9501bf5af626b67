//! Storage backend trait and the in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::sync::{read, write};

/// A string key → string value storage, in the manner of browser web storage.
///
/// Implementations must be safe to share between engines; two engines built
/// over the same backend see each other's writes.
pub trait StorageBackend: Send + Sync {
    /// Read the raw entry for `key`.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write the raw entry for `key`, replacing any previous one.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the entry for `key`. Deleting a missing entry is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// In-process storage, lost when the last handle is dropped.
///
/// Used as the session backend. An optional byte quota over keys and values
/// mimics the limits of browser storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that refuses writes once keys plus values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> usize {
        read(&self.items)
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    pub fn len(&self) -> usize {
        read(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.items).is_empty()
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(read(&self.items).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = write(&self.items);
        if let Some(limit) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > limit {
                return Err(Error::QuotaExceeded {
                    key: key.to_owned(),
                    limit,
                });
            }
        }
        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        write(&self.items).remove(key);
        Ok(())
    }
}
