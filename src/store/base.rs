use std::sync::Arc;

use tracing::{error, info};

use super::{file_store::FileStore, memory_store::MemoryStore};
use crate::config::{StoreBackend, StoreConfig};

/// Key the access token is persisted under.
pub const ACCESS_KEY: &str = "access";
/// Key the refresh token is persisted under.
pub const REFRESH_KEY: &str = "refresh";

/// Durable key/value storage for the credential pair.
///
/// Only the session coordinator talks to a store. Reads are synchronous so the
/// session status can be answered without suspending.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
    fn remove(&self, key: &str) -> Result<(), String>;
    /// Whether values survive a restart of the process.
    fn is_durable(&self) -> bool {
        false
    }
}

/// Creates a concrete store implementation based on the StoreConfig.
/// If `store.enabled = false`, returns a MemoryStore. Otherwise, picks the specified backend.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn TokenStore>, String> {
    if !config.enabled {
        info!("Durable token store is disabled. Using MemoryStore.");
        return Ok(Arc::new(MemoryStore::new()));
    }

    match &config.backend {
        Some(StoreBackend::File(file_config)) => match FileStore::open(file_config) {
            Ok(store) => {
                info!(path = %file_config.path.display(), "Opened file token store.");
                Ok(Arc::new(store))
            }
            Err(e) => {
                error!("Failed to open file token store: {}", e);
                Err(e)
            }
        },
        None => {
            error!("Store is enabled, but no backend config is provided!");
            Err("store is enabled but no backend is configured".to_string())
        }
    }
}
