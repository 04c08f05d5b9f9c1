use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TokenStore;

/// Config for a JSON file holding the persisted tokens.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct FileStoreConfig {
    pub path: PathBuf,
}

/// A store that keeps its values in memory and writes every change through
/// to a small JSON document on disk, so a later process can restore them.
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens the store, loading whatever a previous run persisted.
    /// A missing file is treated as an empty store.
    pub fn open(config: &FileStoreConfig) -> Result<Self, String> {
        let values = match fs::read_to_string(&config.path) {
            Ok(raw) if raw.trim().is_empty() => HashMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                format!(
                    "Failed to parse token file '{}': {}",
                    config.path.display(),
                    e
                )
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(format!(
                    "Failed to read token file '{}': {}",
                    config.path.display(),
                    e
                ))
            }
        };
        debug!(
            path = %config.path.display(),
            keys = values.len(),
            "Loaded token file"
        );

        Ok(Self {
            path: config.path.clone(),
            values: Mutex::new(values),
        })
    }

    fn flush(&self, values: &HashMap<String, String>) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
            }
        }
        let serialized = serde_json::to_string_pretty(values)
            .map_err(|e| format!("Failed to serialize tokens: {}", e))?;

        // Write to a sibling file first so a crash never leaves a truncated document.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serialized)
            .map_err(|e| format!("Failed to write '{}': {}", tmp.display(), e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| format!("Failed to replace '{}': {}", self.path.display(), e))
    }
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .expect("file store mutex poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut values = self.values.lock().expect("file store mutex poisoned");
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        let mut values = self.values.lock().expect("file store mutex poisoned");
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&values)
    }

    fn is_durable(&self) -> bool {
        true
    }
}
