use std::sync::Arc;

use super::SharedState;
use crate::config::{EngineConfig, TickMode};
use crate::error::Result;
use crate::persistence::{FileStorage, MemoryStorage, StorageBackend};
use crate::scheduler::{ManualDriver, TickDriver};
use crate::store::Snapshot;

/// Builder for [`SharedState`].
///
/// Explicit backends and drivers take precedence over the ones the
/// [`EngineConfig`] would create.
///
/// # Examples
///
/// ```
/// use keystate::{EngineConfig, MemoryStorage, SharedState};
/// use std::sync::Arc;
///
/// let state = SharedState::builder()
///     .config(EngineConfig::default())
///     .local_backend(Arc::new(MemoryStorage::new()))
///     .build()
///     .unwrap();
/// assert!(!state.is_hydrated());
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    local: Option<Arc<dyn StorageBackend>>,
    session: Option<Arc<dyn StorageBackend>>,
    driver: Option<Arc<dyn TickDriver>>,
    snapshot: Option<Snapshot>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn local_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.local = Some(backend);
        self
    }

    pub fn session_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.session = Some(backend);
        self
    }

    pub fn tick_driver(mut self, driver: Arc<dyn TickDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Hydrate the engine from `snapshot` as soon as it is built.
    pub fn hydrate_from(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn build(self) -> Result<SharedState> {
        let config = self.config;
        config.validate()?;

        let local = self.local.or_else(|| open_local(&config));
        let session = self.session.or_else(|| {
            config.session_storage.then(|| {
                let storage = match config.session_quota_bytes {
                    Some(limit) => MemoryStorage::with_quota(limit),
                    None => MemoryStorage::new(),
                };
                Arc::new(storage) as Arc<dyn StorageBackend>
            })
        });
        let driver = match self.driver {
            Some(driver) => driver,
            None => default_driver(config.tick)?,
        };

        let state = SharedState::from_parts(local, session, driver);
        if let Some(snapshot) = self.snapshot {
            state.hydrate(snapshot);
        }
        Ok(state)
    }
}

/// The configured local document, or `None` when it is not configured or
/// cannot be opened.
fn open_local(config: &EngineConfig) -> Option<Arc<dyn StorageBackend>> {
    let dir = config.local_storage_dir.as_ref()?;
    match FileStorage::in_dir(dir, &config.local_storage_file) {
        Ok(storage) => Some(Arc::new(storage) as Arc<dyn StorageBackend>),
        Err(error) => {
            tracing::error!(dir = %dir.display(), %error, "local storage unavailable");
            None
        }
    }
}

fn default_driver(mode: TickMode) -> Result<Arc<dyn TickDriver>> {
    match mode {
        TickMode::Manual => Ok(Arc::new(ManualDriver)),
        TickMode::Tokio => tokio_driver(),
    }
}

#[cfg(feature = "tokio")]
fn tokio_driver() -> Result<Arc<dyn TickDriver>> {
    Ok(Arc::new(crate::scheduler::TokioDriver::current()?))
}

#[cfg(not(feature = "tokio"))]
fn tokio_driver() -> Result<Arc<dyn TickDriver>> {
    Err(crate::error::Error::Config(
        "tick mode `tokio` requires the `tokio` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::BackendKind;
    use crate::{CreateOptions, StateKey};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn session_backend_follows_config() {
        let state = SharedState::builder().build().unwrap();
        assert!(state.persistence().is_available(BackendKind::Session));
        assert!(!state.persistence().is_available(BackendKind::Local));

        let config = EngineConfig {
            session_storage: false,
            ..EngineConfig::default()
        };
        let state = SharedState::builder().config(config).build().unwrap();
        assert!(!state.persistence().is_available(BackendKind::Session));
    }

    #[test]
    fn local_storage_dir_creates_file_backend() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            local_storage_dir: Some(dir.path().join("nested")),
            ..EngineConfig::default()
        };
        let state = SharedState::builder().config(config).build().unwrap();
        assert!(state.persistence().is_available(BackendKind::Local));

        let key: StateKey<u32> = StateKey::new("visits");
        state
            .create(&key, 0, CreateOptions::persist(BackendKind::Local))
            .unwrap();
        state.set(&key, 3).unwrap();
        assert!(dir.path().join("nested").join("keystate.json").exists());
    }

    #[test]
    fn hydrate_from_snapshot_on_build() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("user", json!("ada"));
        let state = SharedState::builder().hydrate_from(snapshot).build().unwrap();
        assert!(state.is_hydrated());
        assert_eq!(
            state.get(&StateKey::<String>::new("user")).unwrap(),
            "ada"
        );
    }

    #[test]
    fn session_quota_from_config() {
        let config = EngineConfig {
            session_quota_bytes: Some(4),
            ..EngineConfig::default()
        };
        let state = SharedState::builder().config(config).build().unwrap();
        let key: StateKey<String> = StateKey::new("draft");
        state
            .create(&key, String::new(), CreateOptions::persist(BackendKind::Session))
            .unwrap();

        state.set(&key, "far too long for four bytes".into()).unwrap();
        assert_eq!(state.get(&key).unwrap(), "far too long for four bytes");
        assert_eq!(state.persistence().get_persisted_value("draft"), None);
    }
}
