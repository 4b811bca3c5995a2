use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::StorageError;
use crate::storage::engine::StorageEngine;
use crate::storage::types::{LoadResult, SaveOptions, StorageInfo};

/// Namespace used by the DogTale app for all of its keys.
pub const DEFAULT_NAMESPACE: &str = "dogtale";

/// Cheap cloneable handle that prefixes every key with `{namespace}-` before
/// delegating to a shared [`StorageEngine`].
///
/// Distinct namespaces over the same engine never observe each other's keys;
/// backup slots inherit the prefix through the primary key.
#[derive(Clone)]
pub struct NamespacedStorage {
    engine: Arc<StorageEngine>,
    prefix: String,
}

impl NamespacedStorage {
    /// A trailing `-` on `namespace` is optional; the prefix always ends with
    /// exactly one.
    pub fn new(engine: Arc<StorageEngine>, namespace: &str) -> Self {
        let prefix = if namespace.ends_with('-') {
            namespace.to_string()
        } else {
            format!("{namespace}-")
        };
        Self { engine, prefix }
    }

    /// The full prefix applied to keys, including the trailing `-`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The engine this facade delegates to.
    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.engine.save(&self.prefixed(key), value)
    }

    pub fn save_with<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        options: SaveOptions,
    ) -> Result<(), StorageError> {
        self.engine.save_with(&self.prefixed(key), value, options)
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> LoadResult<T> {
        self.engine.load(&self.prefixed(key), default)
    }

    /// Removes the value and all of its backups.
    pub fn remove(&self, key: &str) -> bool {
        self.engine.remove(&self.prefixed(key))
    }

    pub fn has(&self, key: &str) -> bool {
        self.engine.has(&self.prefixed(key))
    }

    pub fn create_backup(&self, key: &str) -> bool {
        self.engine.create_backup(&self.prefixed(key))
    }

    pub fn restore_from_backup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.engine.restore_from_backup(&self.prefixed(key))
    }

    /// Slot snapshot for the key; the reported key carries the prefix.
    pub fn info(&self, key: &str) -> StorageInfo {
        self.engine.info(&self.prefixed(key))
    }

    pub fn backup_count(&self, key: &str) -> usize {
        self.engine.backup_count(&self.prefixed(key))
    }

    pub fn clear_backups(&self, key: &str) {
        self.engine.clear_backups(&self.prefixed(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBackend, StorageBackend};
    use serde_json::json;

    fn setup(namespace: &str) -> (Arc<MemoryBackend>, NamespacedStorage) {
        let backend = Arc::new(MemoryBackend::new());
        let engine = Arc::new(StorageEngine::new(backend.clone()));
        (backend, NamespacedStorage::new(engine, namespace))
    }

    #[test]
    fn keys_are_prefixed_with_namespace() {
        let (backend, storage) = setup("dogtale");
        storage.save("journal", &json!({"day": 1})).unwrap();

        assert!(backend.get("dogtale-journal").is_some());
        assert!(backend.get("journal").is_none());
    }

    #[test]
    fn trailing_dash_is_normalized() {
        let (_, with_dash) = setup("dogtale-");
        assert_eq!(with_dash.prefix(), "dogtale-");

        let (_, without_dash) = setup("dogtale");
        assert_eq!(without_dash.prefix(), "dogtale-");
    }

    #[test]
    fn namespaces_isolate_same_logical_key() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = Arc::new(StorageEngine::new(backend.clone()));
        let app = NamespacedStorage::new(engine.clone(), "dogtale");
        let other = NamespacedStorage::new(engine, "cattale");

        app.save("settings", &json!({"theme": "paw"})).unwrap();
        other.save("settings", &json!({"theme": "whisker"})).unwrap();

        let a = app.load("settings", json!(null));
        let b = other.load("settings", json!(null));
        assert_eq!(a.data["theme"], "paw");
        assert_eq!(b.data["theme"], "whisker");
        assert!(!app.has("nothing"));
    }

    #[test]
    fn remove_purges_prefixed_backups() {
        let (backend, storage) = setup("dogtale");
        for v in 1..=3 {
            storage.save("journal", &json!({"v": v})).unwrap();
        }
        assert!(backend.get("dogtale-journal_backup_0").is_some());
        assert_eq!(storage.backup_count("journal"), 2);

        assert!(storage.remove("journal"));
        assert!(!storage.has("journal"));
        assert_eq!(storage.backup_count("journal"), 0);
        assert_eq!(backend.len(), 0);
    }

    #[test]
    fn info_reports_the_prefixed_key() {
        let (_, storage) = setup("dogtale");
        storage.save("journal", &json!({"v": 1})).unwrap();

        let info = storage.info("journal");
        assert_eq!(info.key, "dogtale-journal");
        assert!(info.exists);
        assert_eq!(info.backups[0].key, "dogtale-journal_backup_0");
    }

    #[test]
    fn backup_verbs_operate_through_the_prefix() {
        let (backend, storage) = setup("dogtale");
        storage.save("journal", &json!({"v": 1})).unwrap();

        assert!(storage.create_backup("journal"));
        assert_eq!(storage.backup_count("journal"), 1);

        backend.set("dogtale-journal", "oops").unwrap();
        let restored: serde_json::Value = storage.restore_from_backup("journal").unwrap();
        assert_eq!(restored["v"], 1);

        storage.clear_backups("journal");
        assert_eq!(storage.backup_count("journal"), 0);
        assert!(storage.has("journal"));
    }
}
