//! Achievement-stat cache.
//!
//! The app renders achievement progress from a flat snapshot of counters.
//! Some counters are derivable from data the app already keeps locally
//! (journal entries, favorites, pets, the login streak); the rest only the
//! live backend knows. [`StatsCache`] serves a cached snapshot, re-deriving
//! the local counters when the snapshot goes stale and overwriting with the
//! authoritative numbers whenever a [`StatsProvider`] is wired in and
//! reachable. The cache is best-effort: a failed live fetch keeps the
//! locally derived snapshot and is never surfaced as an error.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::StatsCacheConfig;
use crate::storage::namespace::NamespacedStorage;

const JOURNAL_KEY: &str = "journal";
const FAVORITES_KEY: &str = "favorites";
const PETS_KEY: &str = "pets";
const LOGIN_STREAK_KEY: &str = "login-streak";
const VIRTUAL_PET_KEY: &str = "virtual-pet";
const QUESTS_KEY: &str = "quests-completed";
const ACHIEVEMENTS_KEY: &str = "achievements";
const STATS_KEY: &str = "achievement-stats";

/// Flat snapshot of the counters achievements are checked against. Stored
/// as JSON with these exact snake_case keys; unknown counters default to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AchievementStats {
    pub journal_count: u32,
    pub favorite_count: u32,
    pub breed_count: u32,
    pub pet_count: u32,
    pub login_streak: u32,
    pub virtual_pet_level: u32,
    /// 1 when a virtual pet exists, 0 otherwise.
    pub has_virtual_pet: u32,
    pub quests_completed: u32,
    pub friend_count: u32,
    pub health_records: u32,
    pub activities_created: u32,
    pub reactions_given: u32,
    pub battles_completed: u32,
    pub battles_won: u32,
    pub gyms_conquered: u32,
    pub season_level: u32,
    pub achievement_count: u32,
}

/// The authoritative live source of stats (the app backend). Opaque to this
/// crate; failures are the provider's own error type.
pub trait StatsProvider: Send + Sync {
    fn fetch(&self) -> anyhow::Result<AchievementStats>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LoginStreak {
    count: u32,
    /// YYYY-MM-DD of the last recorded login.
    last_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FavoriteEntry {
    breed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VirtualPet {
    level: u32,
}

fn iso_day(date: time::Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

fn streak_is_fresh(streak: &LoginStreak) -> bool {
    let last = match &streak.last_date {
        Some(d) => d,
        None => return false,
    };
    let today = OffsetDateTime::now_utc().date();
    if last == &iso_day(today) {
        return true;
    }
    today
        .previous_day()
        .map(|y| last == &iso_day(y))
        .unwrap_or(false)
}

/// Cached stat snapshot over a [`NamespacedStorage`], persisted under
/// `achievement-stats`.
pub struct StatsCache {
    storage: NamespacedStorage,
    provider: Option<Arc<dyn StatsProvider>>,
    config: StatsCacheConfig,
    last_refresh: Mutex<Option<Instant>>,
}

impl StatsCache {
    pub fn new(storage: NamespacedStorage) -> Self {
        Self::with_config(storage, StatsCacheConfig::default())
    }

    pub fn with_config(storage: NamespacedStorage, config: StatsCacheConfig) -> Self {
        Self {
            storage,
            provider: None,
            config,
            last_refresh: Mutex::new(None),
        }
    }

    /// Wires in a live source; its numbers overwrite the local derivation on
    /// every successful refresh.
    pub fn set_provider(&mut self, provider: Arc<dyn StatsProvider>) {
        self.provider = Some(provider);
    }

    /// Recomputes the locally derivable counters from the app's own stored
    /// data. Counters only the backend knows stay at 0 here.
    pub fn derive_local(&self) -> AchievementStats {
        let journal: BTreeMap<String, serde_json::Value> =
            self.storage.load(JOURNAL_KEY, BTreeMap::new()).data;

        let favorites: Vec<FavoriteEntry> = self.storage.load(FAVORITES_KEY, Vec::new()).data;
        let breeds: BTreeSet<&str> = favorites
            .iter()
            .filter_map(|f| f.breed.as_deref())
            .filter(|b| !b.is_empty())
            .collect();

        let pets: Vec<serde_json::Value> = self.storage.load(PETS_KEY, Vec::new()).data;

        let streak: LoginStreak = self.storage.load(LOGIN_STREAK_KEY, LoginStreak::default()).data;
        let login_streak = if streak_is_fresh(&streak) {
            streak.count
        } else {
            0
        };

        let has_virtual_pet = self.storage.has(VIRTUAL_PET_KEY);
        let virtual_pet: VirtualPet = self.storage.load(VIRTUAL_PET_KEY, VirtualPet::default()).data;

        let quests: Vec<serde_json::Value> = self.storage.load(QUESTS_KEY, Vec::new()).data;
        let achievements: Vec<serde_json::Value> =
            self.storage.load(ACHIEVEMENTS_KEY, Vec::new()).data;

        AchievementStats {
            journal_count: journal.len() as u32,
            favorite_count: favorites.len() as u32,
            breed_count: breeds.len() as u32,
            pet_count: pets.len() as u32,
            login_streak,
            virtual_pet_level: virtual_pet.level,
            has_virtual_pet: if has_virtual_pet { 1 } else { 0 },
            quests_completed: quests.len() as u32,
            achievement_count: achievements.len() as u32,
            ..Default::default()
        }
    }

    /// Re-derives the local counters, persists them for immediate display,
    /// then overwrites with the live numbers when a provider is wired in and
    /// its fetch succeeds.
    pub fn refresh(&self) -> AchievementStats {
        let local = self.derive_local();
        let _ = self.storage.save(STATS_KEY, &local);

        let snapshot = match &self.provider {
            Some(provider) => match provider.fetch() {
                Ok(live) => {
                    let _ = self.storage.save(STATS_KEY, &live);
                    live
                }
                Err(e) => {
                    log::warn!("live stats fetch failed, keeping locally derived stats: {e}");
                    local
                }
            },
            None => local,
        };

        *self.last_refresh.lock().unwrap() = Some(Instant::now());
        snapshot
    }

    /// The current snapshot: refreshed when older than the configured
    /// interval, otherwise served from the persisted cache.
    pub fn current(&self) -> AchievementStats {
        let stale = {
            let last = self.last_refresh.lock().unwrap();
            match *last {
                Some(at) => at.elapsed() >= self.config.refresh_interval,
                None => true,
            }
        };
        if stale {
            return self.refresh();
        }
        self.storage.load(STATS_KEY, AchievementStats::default()).data
    }

    /// Applies an optimistic in-place change to the cached snapshot and
    /// persists it, without waiting for the next refresh.
    pub fn bump(&self, apply: impl FnOnce(&mut AchievementStats)) -> AchievementStats {
        let mut stats = self.storage.load(STATS_KEY, AchievementStats::default()).data;
        apply(&mut stats);
        let _ = self.storage.save(STATS_KEY, &stats);
        stats
    }

    /// Records a login for today and returns the streak length: unchanged
    /// when today is already recorded, extended when the last login was
    /// yesterday, reset to 1 otherwise.
    pub fn record_login(&self) -> u32 {
        let mut streak: LoginStreak = self.storage.load(LOGIN_STREAK_KEY, LoginStreak::default()).data;
        let today = iso_day(OffsetDateTime::now_utc().date());

        if streak.last_date.as_deref() == Some(today.as_str()) {
            return streak.count;
        }

        let yesterday = OffsetDateTime::now_utc().date().previous_day().map(iso_day);
        if streak.last_date.is_some() && streak.last_date == yesterday {
            streak.count += 1;
        } else {
            streak.count = 1;
        }
        streak.last_date = Some(today);
        let _ = self.storage.save(LOGIN_STREAK_KEY, &streak);
        streak.count
    }
}
