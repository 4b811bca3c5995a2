use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::StorageConfig;
use crate::errors::StorageError;
use crate::storage::backend::StorageBackend;
use crate::storage::rotation;
use crate::storage::types::{BackupSlotInfo, LoadResult, SaveOptions, StorageInfo};

/// Resilient save/load engine over an injected [`StorageBackend`].
///
/// Every save rotates the superseded value into backup generations, writes,
/// and verifies the write by reading it back; every load falls back through
/// the backup generations when the primary value fails to parse. Rotation and
/// the primary write are separate backend operations, so an interruption
/// between them can leave a duplicate generation; a single writer per key is
/// assumed.
pub struct StorageEngine {
    backend: Arc<dyn StorageBackend>,
    config: StorageConfig,
}

impl StorageEngine {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(backend, StorageConfig::default())
    }

    pub fn with_config(backend: Arc<dyn StorageBackend>, config: StorageConfig) -> Self {
        Self { backend, config }
    }

    /// The backend this engine writes through.
    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub fn max_backups(&self) -> usize {
        self.config.max_backups
    }

    /// Serializes and stores `value` under `key` with backup rotation.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.save_with(key, value, SaveOptions::default())
    }

    /// Serializes and stores `value` under `key`.
    ///
    /// Pipeline: serialize, rotate the superseded value into the backup
    /// generations (if requested and present), write, verify by read-back.
    /// A write that fails on quota purges this key's backups and retries
    /// once; any other failure is terminal.
    pub fn save_with<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        options: SaveOptions,
    ) -> Result<(), StorageError> {
        let serialized =
            serde_json::to_string(value).map_err(|source| StorageError::Serialize {
                key: key.to_string(),
                source,
            })?;

        if options.create_backup {
            rotation::rotate_backups(self.backend.as_ref(), key, self.config.max_backups);
        }

        match self.write_verified(key, &serialized) {
            Ok(()) => Ok(()),
            Err(first) if first.is_quota() => {
                log::warn!("save of `{key}` hit the storage quota, clearing backups and retrying");
                rotation::clear_backups(self.backend.as_ref(), key, self.config.max_backups);
                self.write_verified(key, &serialized)
            }
            Err(e) => {
                log::warn!("save failed for `{key}`: {e}");
                Err(e)
            }
        }
    }

    /// Loads and deserializes the value under `key`.
    ///
    /// An absent key yields `default`. A primary value that fails to parse as
    /// `T` triggers the backup cascade: the newest generation that parses
    /// wins, is written back to the primary slot, and is returned with
    /// `recovered` set. When no generation is usable (or the write-back
    /// fails) the result carries `default` plus the original parse error.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> LoadResult<T> {
        let raw = match self.backend.get(key) {
            Some(raw) => raw,
            None => return LoadResult::fresh(default),
        };

        let parse_err = match serde_json::from_str::<T>(&raw) {
            Ok(data) => return LoadResult::fresh(data),
            Err(source) => StorageError::Parse {
                key: key.to_string(),
                source,
            },
        };
        log::warn!("stored value for `{key}` is unreadable, trying backups: {parse_err}");

        match rotation::recover_from_backups::<T>(
            self.backend.as_ref(),
            key,
            self.config.max_backups,
        ) {
            Some((recovered_raw, data)) => {
                if let Err(e) = self.backend.set(key, &recovered_raw) {
                    log::warn!("could not restore recovered value to `{key}`: {e}");
                    return LoadResult::fallback(default, parse_err);
                }
                LoadResult::recovered(data)
            }
            None => LoadResult::fallback(default, parse_err),
        }
    }

    /// Removes the primary value and every backup generation for `key`.
    /// Returns `false` when the primary removal failed.
    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove(key) {
            Ok(()) => {
                rotation::clear_backups(self.backend.as_ref(), key, self.config.max_backups);
                true
            }
            Err(e) => {
                log::warn!("failed to remove `{key}`: {e}");
                false
            }
        }
    }

    /// True when a primary value is stored under `key`.
    pub fn has(&self, key: &str) -> bool {
        self.backend.get(key).is_some()
    }

    /// Rotates the current value of `key` into the backup generations without
    /// writing anything new. Returns `true` when a backup was captured.
    pub fn create_backup(&self, key: &str) -> bool {
        rotation::rotate_backups(self.backend.as_ref(), key, self.config.max_backups)
    }

    /// Restores the newest usable backup into the primary slot and returns
    /// its value, or `None` when no generation parses as `T` or the primary
    /// write fails.
    pub fn restore_from_backup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let (raw, value) = rotation::recover_from_backups::<T>(
            self.backend.as_ref(),
            key,
            self.config.max_backups,
        )?;
        self.backend.set(key, &raw).ok()?;
        Some(value)
    }

    /// Removes every backup generation for `key`, leaving the primary value.
    pub fn clear_backups(&self, key: &str) {
        rotation::clear_backups(self.backend.as_ref(), key, self.config.max_backups);
    }

    /// Number of backup generations currently stored for `key`.
    pub fn backup_count(&self, key: &str) -> usize {
        rotation::backup_count(self.backend.as_ref(), key, self.config.max_backups)
    }

    /// Snapshot of the primary slot and every backup slot for `key`.
    pub fn info(&self, key: &str) -> StorageInfo {
        let main = self.backend.get(key);
        let backups: Vec<BackupSlotInfo> = (0..self.config.max_backups)
            .map(|index| {
                let slot = rotation::backup_key(key, index);
                let value = self.backend.get(&slot);
                BackupSlotInfo {
                    key: slot,
                    index,
                    exists: value.is_some(),
                    size: value.map(|v| v.len()).unwrap_or(0),
                }
            })
            .collect();

        StorageInfo {
            key: key.to_string(),
            exists: main.is_some(),
            size: main.map(|v| v.len()).unwrap_or(0),
            backup_count: backups.iter().filter(|b| b.exists).count(),
            total_backup_size: backups.iter().map(|b| b.size).sum(),
            backups,
        }
    }

    fn write_verified(&self, key: &str, serialized: &str) -> Result<(), StorageError> {
        self.backend.set(key, serialized)?;
        match self.backend.get(key) {
            Some(stored) if stored == serialized => Ok(()),
            _ => Err(StorageError::VerifyFailed {
                key: key.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Entry {
        v: u32,
    }

    fn setup() -> (Arc<MemoryBackend>, StorageEngine) {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = Arc::new(MemoryBackend::new());
        let engine = StorageEngine::new(backend.clone());
        (backend, engine)
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_, engine) = setup();
        engine.save("k", &Entry { v: 1 }).unwrap();

        let result = engine.load("k", Entry { v: 0 });
        assert_eq!(result.data, Entry { v: 1 });
        assert!(!result.recovered);
        assert!(result.error.is_none());
    }

    #[test]
    fn load_missing_key_returns_default_without_error() {
        let (_, engine) = setup();
        let result = engine.load("absent", Entry { v: 42 });
        assert_eq!(result.data, Entry { v: 42 });
        assert!(!result.recovered);
        assert!(result.error.is_none());
    }

    #[test]
    fn first_save_creates_no_backup() {
        let (backend, engine) = setup();
        engine.save("k", &Entry { v: 1 }).unwrap();

        assert!(backend.get("k_backup_0").is_none());
        assert_eq!(engine.backup_count("k"), 0);
    }

    #[test]
    fn repeated_saves_rotate_generations() {
        let (backend, engine) = setup();
        for v in 1..=4 {
            engine.save("k", &Entry { v }).unwrap();
        }

        assert_eq!(backend.get("k").as_deref(), Some("{\"v\":4}"));
        assert_eq!(backend.get("k_backup_0").as_deref(), Some("{\"v\":3}"));
        assert_eq!(backend.get("k_backup_1").as_deref(), Some("{\"v\":2}"));
        assert_eq!(backend.get("k_backup_2").as_deref(), Some("{\"v\":1}"));

        // a fifth save evicts the oldest generation
        engine.save("k", &Entry { v: 5 }).unwrap();
        assert_eq!(backend.get("k_backup_2").as_deref(), Some("{\"v\":2}"));
    }

    #[test]
    fn save_without_backup_never_rotates() {
        let (backend, engine) = setup();
        engine.save("k", &Entry { v: 1 }).unwrap();
        engine.save("k", &Entry { v: 2 }).unwrap(); // backup_0 = v1

        engine
            .save_with("k", &Entry { v: 3 }, SaveOptions {
                create_backup: false,
            })
            .unwrap();

        assert_eq!(backend.get("k").as_deref(), Some("{\"v\":3}"));
        // still the generation captured before the opted-out write
        assert_eq!(backend.get("k_backup_0").as_deref(), Some("{\"v\":1}"));
        assert_eq!(engine.backup_count("k"), 1);
    }

    #[test]
    fn corrupted_primary_recovers_and_heals() {
        let (backend, engine) = setup();
        engine.save("k", &Entry { v: 1 }).unwrap();
        engine.save("k", &Entry { v: 2 }).unwrap();

        backend.set("k", "{definitely not json").unwrap();

        let result = engine.load("k", Entry { v: 0 });
        assert_eq!(result.data, Entry { v: 1 });
        assert!(result.recovered);
        assert!(result.error.is_none());

        // primary slot healed with the recovered value
        assert_eq!(backend.get("k").as_deref(), Some("{\"v\":1}"));
    }

    #[test]
    fn recovery_skips_corrupt_generations() {
        let (backend, engine) = setup();
        for v in 1..=3 {
            engine.save("k", &Entry { v }).unwrap();
        }
        // primary and newest backup both damaged
        backend.set("k", "garbage").unwrap();
        backend.set("k_backup_0", "also garbage").unwrap();

        let result = engine.load("k", Entry { v: 0 });
        assert_eq!(result.data, Entry { v: 1 });
        assert!(result.recovered);
    }

    #[test]
    fn exhausted_recovery_falls_back_to_default_with_error() {
        let (backend, engine) = setup();
        engine.save("k", &Entry { v: 1 }).unwrap();
        backend.set("k", "bad").unwrap();
        // no backups were ever written (single save), so recovery has nothing
        let result = engine.load("k", Entry { v: 9 });

        assert_eq!(result.data, Entry { v: 9 });
        assert!(!result.recovered);
        assert!(matches!(result.error, Some(StorageError::Parse { .. })));
    }

    #[test]
    fn corruption_across_every_generation_falls_back_to_default() {
        let (backend, engine) = setup();
        for v in 1..=4 {
            engine.save("k", &Entry { v }).unwrap();
        }
        assert_eq!(engine.backup_count("k"), 3);

        backend.set("k", "chewed").unwrap();
        backend.set("k_backup_0", "{half a record").unwrap();
        backend.set("k_backup_1", "not json either").unwrap();
        backend.set("k_backup_2", "").unwrap();

        let result = engine.load("k", Entry { v: 9 });
        assert_eq!(result.data, Entry { v: 9 });
        assert!(!result.recovered);
        assert!(matches!(result.error, Some(StorageError::Parse { .. })));

        // nothing pretended to heal the primary slot
        assert_eq!(backend.get("k").as_deref(), Some("chewed"));
    }

    #[test]
    fn typed_load_rejects_wrong_shape_and_recovers() {
        let (backend, engine) = setup();
        engine.save("k", &Entry { v: 7 }).unwrap();
        engine.save("k", &Entry { v: 8 }).unwrap();

        // valid JSON in the primary slot, but not an Entry
        backend.set("k", "[1,2,3]").unwrap();

        let result = engine.load("k", Entry { v: 0 });
        assert_eq!(result.data, Entry { v: 7 });
        assert!(result.recovered);
    }

    #[test]
    fn quota_exhaustion_clears_backups_and_retries() {
        let backend = Arc::new(MemoryBackend::with_quota(100));
        let engine = StorageEngine::new(backend.clone());

        // four small saves fill the backup generations
        for v in 1..=4 {
            engine.save("k", &Entry { v }).unwrap();
        }
        assert_eq!(engine.backup_count("k"), 3);

        // a large value no longer fits next to the backups
        let big = json!({ "data": "0123456789012345678901234567890123456789" });
        engine.save("k", &big).unwrap();

        assert_eq!(engine.backup_count("k"), 0);
        let result = engine.load("k", json!(null));
        assert_eq!(result.data, big);
        assert!(!result.recovered);
    }

    #[test]
    fn quota_failure_with_no_backups_to_free_is_terminal() {
        let backend = Arc::new(MemoryBackend::with_quota(10));
        let engine = StorageEngine::new(backend);

        let big = json!({ "data": "far too large for this quota" });
        let err = engine.save("k", &big).unwrap_err();
        assert!(err.is_quota());
    }

    /// Stores every value with its last byte missing, so read-back never
    /// matches what was written.
    struct TruncatingBackend {
        inner: MemoryBackend,
    }

    impl StorageBackend for TruncatingBackend {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            let cut = &value[..value.len().saturating_sub(1)];
            self.inner.set(key, cut)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }

        fn clear(&self) -> Result<(), StorageError> {
            self.inner.clear()
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn keys(&self) -> Vec<String> {
            self.inner.keys()
        }
    }

    #[test]
    fn lossy_backend_surfaces_verify_failure() {
        let engine = StorageEngine::new(Arc::new(TruncatingBackend {
            inner: MemoryBackend::new(),
        }));

        let err = engine.save("k", &Entry { v: 1 }).unwrap_err();
        assert!(matches!(err, StorageError::VerifyFailed { ref key } if key == "k"));
    }

    /// Rejects writes to one configurable key, everything else passes through.
    struct DenyingBackend {
        inner: MemoryBackend,
        deny: Mutex<Option<String>>,
    }

    impl DenyingBackend {
        fn new() -> Self {
            Self {
                inner: MemoryBackend::new(),
                deny: Mutex::new(None),
            }
        }

        fn deny_writes_to(&self, key: &str) {
            *self.deny.lock().unwrap() = Some(key.to_string());
        }
    }

    impl StorageBackend for DenyingBackend {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.deny.lock().unwrap().as_deref() == Some(key) {
                return Err(StorageError::Backend("write rejected".to_string()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }

        fn clear(&self) -> Result<(), StorageError> {
            self.inner.clear()
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn keys(&self) -> Vec<String> {
            self.inner.keys()
        }
    }

    #[test]
    fn failed_heal_write_degrades_to_default() {
        let backend = Arc::new(DenyingBackend::new());
        let engine = StorageEngine::new(backend.clone());

        engine.save("k", &Entry { v: 1 }).unwrap();
        engine.save("k", &Entry { v: 2 }).unwrap();
        backend.inner.set("k", "broken").unwrap();
        backend.deny_writes_to("k");

        // a backup parses, but it cannot be written back to the primary slot
        let result = engine.load("k", Entry { v: 0 });
        assert_eq!(result.data, Entry { v: 0 });
        assert!(!result.recovered);
        assert!(matches!(result.error, Some(StorageError::Parse { .. })));
    }

    #[test]
    fn serialize_failure_touches_nothing() {
        let (backend, engine) = setup();
        engine.save("k", &Entry { v: 1 }).unwrap();
        engine.save("k", &Entry { v: 2 }).unwrap(); // backup_0 = v1

        // tuple map keys cannot become JSON object keys
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);

        let err = engine.save("k", &bad).unwrap_err();
        assert!(matches!(err, StorageError::Serialize { .. }));

        // neither the primary value nor the generations moved
        assert_eq!(backend.get("k").as_deref(), Some("{\"v\":2}"));
        assert_eq!(backend.get("k_backup_0").as_deref(), Some("{\"v\":1}"));
        assert_eq!(engine.backup_count("k"), 1);
    }

    #[test]
    fn remove_purges_primary_and_backups() {
        let (backend, engine) = setup();
        for v in 1..=3 {
            engine.save("k", &Entry { v }).unwrap();
        }
        assert_eq!(engine.backup_count("k"), 2);

        assert!(engine.remove("k"));
        assert!(!engine.has("k"));
        assert_eq!(engine.backup_count("k"), 0);
        assert_eq!(backend.len(), 0);
    }

    #[test]
    fn manual_backup_and_restore() {
        let (backend, engine) = setup();

        assert!(!engine.create_backup("k")); // nothing to capture yet

        engine.save("k", &Entry { v: 1 }).unwrap();
        assert!(engine.create_backup("k"));
        assert_eq!(backend.get("k_backup_0").as_deref(), Some("{\"v\":1}"));

        backend.set("k", "smashed").unwrap();
        let restored: Entry = engine.restore_from_backup("k").unwrap();
        assert_eq!(restored, Entry { v: 1 });
        assert_eq!(backend.get("k").as_deref(), Some("{\"v\":1}"));

        engine.clear_backups("k");
        assert!(engine.restore_from_backup::<Entry>("k").is_none());
    }

    #[test]
    fn info_reports_every_slot() {
        let (_, engine) = setup();
        engine.save("k", &Entry { v: 1 }).unwrap();
        engine.save("k", &Entry { v: 2 }).unwrap();

        let info = engine.info("k");
        assert_eq!(info.key, "k");
        assert!(info.exists);
        assert_eq!(info.size, "{\"v\":2}".len());
        assert_eq!(info.backups.len(), 3);
        assert_eq!(info.backups[0].key, "k_backup_0");
        assert!(info.backups[0].exists);
        assert_eq!(info.backups[0].size, "{\"v\":1}".len());
        assert!(!info.backups[1].exists);
        assert!(!info.backups[2].exists);
        assert_eq!(info.backup_count, 1);
        assert_eq!(info.total_backup_size, "{\"v\":1}".len());
    }

    #[test]
    fn zero_backups_disables_rotation_and_recovery() {
        let backend = Arc::new(MemoryBackend::new());
        let engine =
            StorageEngine::with_config(backend.clone(), StorageConfig { max_backups: 0 });

        engine.save("k", &Entry { v: 1 }).unwrap();
        engine.save("k", &Entry { v: 2 }).unwrap();
        assert!(backend.get("k_backup_0").is_none());
        assert!(engine.info("k").backups.is_empty());

        backend.set("k", "broken").unwrap();
        let result = engine.load("k", Entry { v: 0 });
        assert_eq!(result.data, Entry { v: 0 });
        assert!(result.error.is_some());
    }
}
