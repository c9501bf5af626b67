//! File-backed storage.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use super::StorageBackend;
use crate::error::Result;
use crate::sync::lock;

type Document = BTreeMap<String, String>;

/// Durable storage kept in one JSON document.
///
/// The document is an object with one entry per key, named verbatim, whose
/// value is the serialized string. Nothing is cached: every read loads the
/// document and every write reloads it, applies the change and rewrites it
/// through a temporary file and a rename, so a crash never leaves it
/// half-written. All handles on one path in a process share a lock, so
/// engines opened on the same document never drop each other's entries.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    guard: Arc<Mutex<()>>,
}

impl FileStorage {
    /// Open (or lazily create) the document at `path`.
    ///
    /// An unreadable document is treated as empty and replaced on the next
    /// write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = normalize(path.into());
        let storage = Self {
            guard: path_lock(&path),
            path,
        };
        storage.load()?;
        Ok(storage)
    }

    /// Open the document named `file` inside `dir`, creating `dir` if needed.
    pub fn in_dir(dir: impl AsRef<Path>, file: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Self::open(dir.join(file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Document> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text).unwrap_or_else(|error| {
                tracing::warn!(path = %self.path.display(), %error, "discarding unreadable storage file");
                Document::new()
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, items: &Document) -> Result<()> {
        let text = serde_json::to_string_pretty(items)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// `<file>.tmp` next to the document.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let _guard = lock(&self.guard);
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = lock(&self.guard);
        let mut items = self.load()?;
        items.insert(key.to_owned(), value.to_owned());
        self.save(&items)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = lock(&self.guard);
        let mut items = self.load()?;
        if items.remove(key).is_some() {
            self.save(&items)?;
        }
        Ok(())
    }
}

/// Resolve the directory part so that different spellings of one document
/// share a lock. The file itself may not exist yet.
fn normalize(path: PathBuf) -> PathBuf {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path;
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    match parent.canonicalize() {
        Ok(dir) => dir.join(name),
        Err(_) => path,
    }
}

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>> = OnceLock::new();

    let mut locks = lock(LOCKS.get_or_init(Default::default));
    if let Some(existing) = locks.get(path).and_then(Weak::upgrade) {
        return existing;
    }
    locks.retain(|_, weak| weak.strong_count() > 0);
    let fresh = Arc::new(Mutex::new(()));
    locks.insert(path.to_owned(), Arc::downgrade(&fresh));
    fresh
}
