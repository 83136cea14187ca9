use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// The one persisted value: the last vault database path the user chose.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredConfig {
    #[serde(rename = "dbPath", default)]
    pub db_path: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config store poisoned")]
    Poisoned,
}

pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<StoredConfig, ConfigError>;
    fn save(&self, config: &StoredConfig) -> Result<(), ConfigError>;
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<StoredConfig, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, config: &StoredConfig) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let payload = serde_json::to_string_pretty(config)?;
        // Write-then-rename so a crash never leaves half a file behind.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoredConfig>,
}

impl MemoryStore {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(StoredConfig {
                db_path: db_path.into(),
            }),
        }
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<StoredConfig, ConfigError> {
        self.inner
            .lock()
            .map(|g| g.clone())
            .map_err(|_| ConfigError::Poisoned)
    }

    fn save(&self, config: &StoredConfig) -> Result<(), ConfigError> {
        let mut guard = self.inner.lock().map_err(|_| ConfigError::Poisoned)?;
        *guard = config.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("config.json"));
        assert_eq!(store.load().unwrap(), StoredConfig::default());
    }

    #[test]
    fn save_then_load_uses_wire_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("config.json"));
        store
            .save(&StoredConfig {
                db_path: "/vault.kdbx".to_string(),
            })
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"dbPath\""));
        assert_eq!(store.load().unwrap().db_path, "/vault.kdbx");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileStore::new(path).load(),
            Err(ConfigError::Parse(_))
        ));
    }
}
