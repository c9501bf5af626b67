//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

const DEFAULT_LOCAL_FILE: &str = "keystate.json";

/// How the engine gets its ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickMode {
    /// Notifications wait for an explicit `flush()`.
    #[default]
    Manual,
    /// Ticks run as tasks on the current tokio runtime.
    Tokio,
}

/// Settings for building a [`SharedState`](crate::SharedState).
///
/// # Examples
///
/// ```
/// use keystate::{EngineConfig, TickMode};
///
/// let config = EngineConfig::from_json_str(r#"{ "session_storage": false }"#).unwrap();
/// assert!(!config.session_storage);
/// assert_eq!(config.tick, TickMode::Manual);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory of the local storage document. `None` means no local backend.
    pub local_storage_dir: Option<PathBuf>,
    /// File name of the local storage document.
    pub local_storage_file: String,
    /// Whether to provide an in-memory session backend.
    pub session_storage: bool,
    /// Byte limit of the session backend.
    pub session_quota_bytes: Option<usize>,
    pub tick: TickMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_storage_dir: None,
            local_storage_file: DEFAULT_LOCAL_FILE.to_owned(),
            session_storage: true,
            session_quota_bytes: None,
            tick: TickMode::Manual,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.local_storage_file.is_empty() {
            return Err(Error::Config("local_storage_file is empty".into()));
        }
        if cfg!(not(feature = "tokio")) && self.tick == TickMode::Tokio {
            return Err(Error::Config(
                "tick mode `tokio` requires the `tokio` feature".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert!(config.local_storage_dir.is_none());
        assert_eq!(config.local_storage_file, "keystate.json");
        assert!(config.session_storage);
        assert_eq!(config.tick, TickMode::Manual);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{ "local_storage_dir": "/tmp/app", "session_quota_bytes": 4096 }"#)
                .unwrap();
        assert_eq!(config.local_storage_dir, Some(PathBuf::from("/tmp/app")));
        assert_eq!(config.session_quota_bytes, Some(4096));
        assert!(config.session_storage);
    }

    #[test]
    fn rejects_empty_file_name() {
        let err = EngineConfig::from_json_str(r#"{ "local_storage_file": "" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[cfg(not(feature = "tokio"))]
    #[test]
    fn tokio_mode_needs_the_feature() {
        let err = EngineConfig::from_json_str(r#"{ "tick": "tokio" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
