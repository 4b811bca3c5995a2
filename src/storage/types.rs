use crate::errors::StorageError;

/// Per-save options.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    /// Rotate the previous value into the backup generations before writing.
    pub create_backup: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
        }
    }
}

/// Outcome of a resilient load. A load always yields usable data; `recovered`
/// and `error` tell the caller how it was obtained.
#[derive(Debug)]
pub struct LoadResult<T> {
    /// The loaded value, a recovered backup, or the caller's default.
    pub data: T,
    /// True when `data` came from a backup generation instead of the primary slot.
    pub recovered: bool,
    /// Set only when both the primary value and every backup were unusable.
    pub error: Option<StorageError>,
}

impl<T> LoadResult<T> {
    /// Data read from the primary slot (or the default for an absent key).
    pub fn fresh(data: T) -> Self {
        Self {
            data,
            recovered: false,
            error: None,
        }
    }

    /// Data salvaged from a backup generation.
    pub fn recovered(data: T) -> Self {
        Self {
            data,
            recovered: true,
            error: None,
        }
    }

    /// The caller's default, with the error that exhausted recovery.
    pub fn fallback(data: T, error: StorageError) -> Self {
        Self {
            data,
            recovered: false,
            error: Some(error),
        }
    }
}

/// Snapshot of one key's primary slot and backup generations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInfo {
    /// The (already prefixed) primary key.
    pub key: String,
    pub exists: bool,
    /// Size of the primary value in bytes, 0 when absent.
    pub size: usize,
    /// One entry per configured backup slot, newest first.
    pub backups: Vec<BackupSlotInfo>,
    /// Number of backup slots currently holding a value.
    pub backup_count: usize,
    /// Combined size of all backup values in bytes.
    pub total_backup_size: usize,
}

/// State of a single backup slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSlotInfo {
    /// Full slot key, e.g. `dogtale-journal_backup_0`.
    pub key: String,
    /// Generation index, 0 is newest.
    pub index: usize,
    pub exists: bool,
    /// Size of the slot value in bytes, 0 when empty.
    pub size: usize,
}
