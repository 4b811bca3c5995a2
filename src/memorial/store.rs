use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::memorial::record::{now_ms, Memorial, MemorialDraft, MemorialPatch};
use crate::storage::namespace::NamespacedStorage;

const MEMORIALS_KEY: &str = "memorials";
const CANDLES_KEY: &str = "memorial-candles";
const TRIBUTES_KEY: &str = "memorial-tributes";
const LOCKED_DATES_KEY: &str = "memorial-locked-dates";

/// A community tribute left on a memorial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tribute {
    pub id: Uuid,
    pub memorial_id: String,
    pub author: String,
    pub message: String,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// A calendar date pinned to a memorial so its image is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedDate {
    pub memorial_id: String,
    pub image_data: serde_json::Value,
    /// Unix milliseconds.
    pub locked_at: i64,
}

/// Everything the memorial feature persists, bundled for backup transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorialExport {
    pub memorials: Vec<Memorial>,
    pub candles: BTreeMap<String, u32>,
    pub tributes: BTreeMap<String, Vec<Tribute>>,
    pub locked_dates: BTreeMap<String, LockedDate>,
    /// RFC 3339 stamp of when the export was taken.
    pub exported_at: String,
}

/// Persistence for pet memorials and their side ledgers (candles, tributes,
/// locked calendar dates), stored through a [`NamespacedStorage`].
///
/// The memorial list is kept most-recent-first. Write failures are logged by
/// the storage layer; the mutating verbs report them through their return
/// values where the caller can act on it.
pub struct MemorialStore {
    storage: NamespacedStorage,
}

impl MemorialStore {
    pub fn new(storage: NamespacedStorage) -> Self {
        Self { storage }
    }

    /// All memorials, newest first. Falls back to backups when the stored
    /// list is unreadable.
    pub fn load_all(&self) -> Vec<Memorial> {
        let result = self.storage.load(MEMORIALS_KEY, Vec::new());
        if result.recovered {
            log::info!("memorials recovered from backup");
        }
        result.data
    }

    /// Replaces the stored memorial list.
    pub fn save_all(&self, memorials: &[Memorial]) -> bool {
        self.storage.save(MEMORIALS_KEY, &memorials).is_ok()
    }

    /// Builds a memorial from the draft and prepends it to the list.
    pub fn create(&self, draft: MemorialDraft) -> Memorial {
        let mut memorials = self.load_all();
        let memorial = Memorial::new(draft);
        memorials.insert(0, memorial.clone());
        self.save_all(&memorials);
        memorial
    }

    /// Applies a patch to the memorial with this id, stamping `updated_at`.
    pub fn update(&self, id: &str, patch: MemorialPatch) -> Option<Memorial> {
        let mut memorials = self.load_all();
        let index = memorials.iter().position(|m| m.id == id)?;
        memorials[index].apply(patch);
        let updated = memorials[index].clone();
        self.save_all(&memorials);
        Some(updated)
    }

    /// Removes the memorial with this id. `false` when it was not found or
    /// the shrunken list could not be written.
    pub fn delete(&self, id: &str) -> bool {
        let memorials = self.load_all();
        let filtered: Vec<Memorial> = memorials.iter().filter(|m| m.id != id).cloned().collect();
        if filtered.len() == memorials.len() {
            return false;
        }
        self.save_all(&filtered)
    }

    pub fn get(&self, id: &str) -> Option<Memorial> {
        self.load_all().into_iter().find(|m| m.id == id)
    }

    pub fn add_memory(&self, memorial_id: &str, memory: &str) -> Option<Memorial> {
        let memorial = self.get(memorial_id)?;
        let mut memories = memorial.memories;
        memories.push(memory.to_string());
        self.update(
            memorial_id,
            MemorialPatch {
                memories: Some(memories),
                ..Default::default()
            },
        )
    }

    /// Removes the memory at `index`; an out-of-range index leaves the list
    /// as it is (the update stamp still moves).
    pub fn remove_memory(&self, memorial_id: &str, index: usize) -> Option<Memorial> {
        let memorial = self.get(memorial_id)?;
        let mut memories = memorial.memories;
        if index < memories.len() {
            memories.remove(index);
        }
        self.update(
            memorial_id,
            MemorialPatch {
                memories: Some(memories),
                ..Default::default()
            },
        )
    }

    fn load_candles(&self) -> BTreeMap<String, u32> {
        self.storage.load(CANDLES_KEY, BTreeMap::new()).data
    }

    /// Lights a candle for a memorial and returns the new count. The count
    /// on the memorial record itself is bumped alongside the ledger.
    pub fn light_candle(&self, memorial_id: &str) -> u32 {
        let mut candles = self.load_candles();
        let count = candles.entry(memorial_id.to_string()).or_insert(0);
        *count += 1;
        let new_count = *count;
        let _ = self.storage.save(CANDLES_KEY, &candles);

        if let Some(memorial) = self.get(memorial_id) {
            self.update(
                memorial_id,
                MemorialPatch {
                    candles_lit: Some(memorial.candles_lit + 1),
                    ..Default::default()
                },
            );
        }

        new_count
    }

    pub fn candle_count(&self, memorial_id: &str) -> u32 {
        self.load_candles().get(memorial_id).copied().unwrap_or(0)
    }

    fn load_tributes(&self) -> BTreeMap<String, Vec<Tribute>> {
        self.storage.load(TRIBUTES_KEY, BTreeMap::new()).data
    }

    /// Appends a tribute, bumping the memorial's tribute count. An empty
    /// author becomes "Anonymous".
    pub fn add_tribute(&self, memorial_id: &str, author: &str, message: &str) -> Tribute {
        let mut tributes = self.load_tributes();
        let tribute = Tribute {
            id: Uuid::new_v4(),
            memorial_id: memorial_id.to_string(),
            author: if author.is_empty() {
                "Anonymous".to_string()
            } else {
                author.to_string()
            },
            message: message.to_string(),
            created_at: now_ms(),
        };
        tributes
            .entry(memorial_id.to_string())
            .or_default()
            .push(tribute.clone());
        let _ = self.storage.save(TRIBUTES_KEY, &tributes);

        if let Some(memorial) = self.get(memorial_id) {
            self.update(
                memorial_id,
                MemorialPatch {
                    tribute_count: Some(memorial.tribute_count + 1),
                    ..Default::default()
                },
            );
        }

        tribute
    }

    pub fn tributes_for(&self, memorial_id: &str) -> Vec<Tribute> {
        self.load_tributes().remove(memorial_id).unwrap_or_default()
    }

    fn load_locked(&self) -> BTreeMap<String, LockedDate> {
        self.storage.load(LOCKED_DATES_KEY, BTreeMap::new()).data
    }

    /// Pins a calendar date (YYYY-MM-DD) to a memorial, preserving the given
    /// image data.
    pub fn lock_date(&self, date: &str, memorial_id: &str, image_data: serde_json::Value) -> bool {
        let mut locked = self.load_locked();
        locked.insert(
            date.to_string(),
            LockedDate {
                memorial_id: memorial_id.to_string(),
                image_data,
                locked_at: now_ms(),
            },
        );
        self.storage.save(LOCKED_DATES_KEY, &locked).is_ok()
    }

    /// Unpins a date. `false` when the date was not locked.
    pub fn unlock_date(&self, date: &str) -> bool {
        let mut locked = self.load_locked();
        if locked.remove(date).is_none() {
            return false;
        }
        self.storage.save(LOCKED_DATES_KEY, &locked).is_ok()
    }

    pub fn locked_date(&self, date: &str) -> Option<LockedDate> {
        self.load_locked().remove(date)
    }

    pub fn locked_dates(&self) -> BTreeMap<String, LockedDate> {
        self.load_locked()
    }

    pub fn locked_dates_for(&self, memorial_id: &str) -> Vec<String> {
        self.load_locked()
            .into_iter()
            .filter(|(_, lock)| lock.memorial_id == memorial_id)
            .map(|(date, _)| date)
            .collect()
    }

    /// Bundles all memorial data for transfer or offline backup.
    pub fn export(&self) -> MemorialExport {
        MemorialExport {
            memorials: self.load_all(),
            candles: self.load_candles(),
            tributes: self.load_tributes(),
            locked_dates: self.load_locked(),
            exported_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .expect("RFC 3339"),
        }
    }

    /// Writes a previously exported bundle back into storage. `false` when
    /// any section failed to persist.
    pub fn import(&self, data: &MemorialExport) -> bool {
        let mut ok = self.save_all(&data.memorials);
        ok &= self.storage.save(CANDLES_KEY, &data.candles).is_ok();
        ok &= self.storage.save(TRIBUTES_KEY, &data.tributes).is_ok();
        ok &= self.storage.save(LOCKED_DATES_KEY, &data.locked_dates).is_ok();
        if !ok {
            log::error!("memorial import did not fully persist");
        }
        ok
    }
}
