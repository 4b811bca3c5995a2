use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::StorageError;
use crate::storage::backend::StorageBackend;

/// In-memory backend (no persistence). Used as a default when no durable
/// backend is configured, and in tests.
///
/// An optional byte quota makes quota exhaustion reproducible: with
/// [`with_quota`](Self::with_quota) a write that would push the total of
/// `key.len() + value.len()` over the limit fails with
/// [`StorageError::QuotaExceeded`], like a full browser storage area.
#[derive(Default)]
pub struct MemoryBackend {
    map: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that rejects writes once the summed entry size would exceed
    /// `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    fn usage_of(map: &HashMap<String, String>) -> usize {
        map.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.map.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.map.lock().unwrap();
        if let Some(quota) = self.quota {
            let replaced = map.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let next = Self::usage_of(&map) - replaced + key.len() + value.len();
            if next > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.map.lock().unwrap().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.map.lock().unwrap().clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }

    fn keys(&self) -> Vec<String> {
        let mut v: Vec<String> = self.map.lock().unwrap().keys().cloned().collect();
        v.sort_unstable(); // stable order for deterministic tests
        v
    }
}
