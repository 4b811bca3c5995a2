use std::time::Duration;

/// Knobs for the resilient storage engine.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Number of backup generations rotated per key. Zero disables backups.
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_backups: 3, // Three generations per key
        }
    }
}

/// Knobs for the achievement-stat cache.
#[derive(Debug, Clone)]
pub struct StatsCacheConfig {
    /// How long a cached snapshot stays fresh before `current` re-derives it.
    pub refresh_interval: Duration,
}

impl Default for StatsCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(300),
        }
    }
}
