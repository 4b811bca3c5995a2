use serde::de::DeserializeOwned;

use crate::storage::backend::StorageBackend;

/// Default number of backup generations kept per key.
pub const MAX_BACKUPS: usize = 3;

/// Suffix separating a primary key from its backup slots.
pub const BACKUP_SUFFIX: &str = "_backup";

/// Name of the backup slot at `index` for `key`. Index 0 is the newest
/// generation.
pub fn backup_key(key: &str, index: usize) -> String {
    format!("{key}{BACKUP_SUFFIX}_{index}")
}

/// All slot names for `key`, newest first.
pub fn backup_keys(key: &str, max: usize) -> Vec<String> {
    (0..max).map(|i| backup_key(key, i)).collect()
}

/// One step of a rotation. Steps are executed strictly in plan order:
/// oldest slots move first so a generation is never overwritten before it
/// has been shifted out of the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStep {
    /// Copy slot `from` into slot `to`; if `from` is empty, `to` is removed
    /// so stale generations age out instead of duplicating.
    Shift { from: usize, to: usize },
    /// Copy the primary value into slot 0.
    Capture,
}

/// The ordered rotation pipeline for `max` generations: shift `max-2 -> max-1`
/// down to `0 -> 1`, then capture the primary into slot 0. Empty when backups
/// are disabled.
pub fn rotation_plan(max: usize) -> Vec<RotationStep> {
    let mut plan = Vec::with_capacity(max);
    for to in (1..max).rev() {
        plan.push(RotationStep::Shift { from: to - 1, to });
    }
    if max > 0 {
        plan.push(RotationStep::Capture);
    }
    plan
}

/// Rotates the backup generations for `key`, capturing the current primary
/// value into slot 0. A no-op returning `false` when the primary slot is
/// empty: only a value about to be superseded is worth capturing.
///
/// Best-effort: a failing step logs and aborts the rotation, but the caller's
/// primary write goes ahead regardless.
pub fn rotate_backups(backend: &dyn StorageBackend, key: &str, max: usize) -> bool {
    if max == 0 {
        return false;
    }
    let current = match backend.get(key) {
        Some(c) => c,
        None => return false,
    };

    for step in rotation_plan(max) {
        let result = match step {
            RotationStep::Shift { from, to } => {
                let target = backup_key(key, to);
                match backend.get(&backup_key(key, from)) {
                    Some(value) => backend.set(&target, &value),
                    None => backend.remove(&target),
                }
            }
            RotationStep::Capture => backend.set(&backup_key(key, 0), &current),
        };
        if let Err(e) = result {
            log::error!("backup rotation failed for `{key}`: {e}");
            return false;
        }
    }
    true
}

/// Scans the backup slots newest-first and returns the first one whose
/// contents deserialize as `T`, along with the raw stored string. Corrupt or
/// missing slots are skipped.
pub fn recover_from_backups<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &str,
    max: usize,
) -> Option<(String, T)> {
    for slot in backup_keys(key, max) {
        if let Some(raw) = backend.get(&slot) {
            if let Ok(value) = serde_json::from_str::<T>(&raw) {
                log::info!("recovered `{key}` from backup `{slot}`");
                return Some((raw, value));
            }
        }
    }
    None
}

/// Removes every backup slot for `key`. Best-effort.
pub fn clear_backups(backend: &dyn StorageBackend, key: &str, max: usize) {
    for slot in backup_keys(key, max) {
        if let Err(e) = backend.remove(&slot) {
            log::warn!("failed to clear backup `{slot}`: {e}");
        }
    }
}

/// Number of backup slots currently holding a value for `key`.
pub fn backup_count(backend: &dyn StorageBackend, key: &str, max: usize) -> usize {
    backup_keys(key, max)
        .iter()
        .filter(|slot| backend.get(slot).is_some())
        .count()
}
