use std::collections::HashMap;
use std::sync::Mutex;

use super::TokenStore;

/// A process-local store. Tokens are gone once the process exits.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with an existing credential pair.
    pub fn with_tokens(access: &str, refresh: Option<&str>) -> Self {
        let store = Self::new();
        {
            let mut values = store.values.lock().expect("memory store mutex poisoned");
            values.insert(super::ACCESS_KEY.to_string(), access.to_string());
            if let Some(refresh) = refresh {
                values.insert(super::REFRESH_KEY.to_string(), refresh.to_string());
            }
        }
        store
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .expect("memory store mutex poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.values
            .lock()
            .expect("memory store mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        self.values
            .lock()
            .expect("memory store mutex poisoned")
            .remove(key);
        Ok(())
    }
}
