use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Current time as unix milliseconds, the timestamp unit used throughout the
/// stored records.
pub(crate) fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn random_suffix() -> String {
    const CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    (0..9)
        .map(|_| CHARS[rng.random_range(0..CHARS.len())] as char)
        .collect()
}

/// The two species DogTale knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    #[default]
    Dog,
    Cat,
}

impl Species {
    /// Emoji used when a memorial has no photo of its own.
    pub fn default_photo(&self) -> &'static str {
        match self {
            Species::Dog => "🐕",
            Species::Cat => "🐱",
        }
    }
}

/// A pet memorial as persisted by the app. Field names in the stored JSON
/// are camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memorial {
    pub id: String,
    pub name: String,
    pub breed: String,
    pub species: Species,
    /// Birth date, or the day they entered your life (YYYY-MM-DD).
    pub start_date: String,
    /// The day they crossed the rainbow bridge (YYYY-MM-DD).
    pub end_date: String,
    /// Photo URL, or an emoji fallback.
    pub photo: String,
    pub tribute: String,
    pub memories: Vec<String>,
    pub personality_traits: Vec<String>,
    pub quirks: Vec<String>,
    pub candles_lit: u32,
    pub tribute_count: u32,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds, bumped on every update.
    pub updated_at: i64,
    pub is_public: bool,
}

impl Memorial {
    /// Builds a memorial from a draft, filling defaults and generating the
    /// id and timestamps.
    pub fn new(draft: MemorialDraft) -> Self {
        let species = draft.species.unwrap_or_default();
        let now = now_ms();
        Self {
            id: format!("memorial_{now}_{}", random_suffix()),
            name: draft.name.unwrap_or_else(|| "Beloved Pet".to_string()),
            breed: draft.breed.unwrap_or_else(|| "Unknown".to_string()),
            species,
            start_date: draft.start_date.unwrap_or_default(),
            end_date: draft.end_date.unwrap_or_default(),
            photo: draft
                .photo
                .unwrap_or_else(|| species.default_photo().to_string()),
            tribute: draft.tribute.unwrap_or_default(),
            memories: draft.memories,
            personality_traits: draft.personality_traits,
            quirks: draft.quirks,
            candles_lit: 0,
            tribute_count: 0,
            created_at: now,
            updated_at: now,
            is_public: draft.is_public,
        }
    }

    /// Merges a patch into the record and stamps `updated_at`. The id and
    /// `created_at` are not part of a patch and never change.
    pub fn apply(&mut self, patch: MemorialPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(breed) = patch.breed {
            self.breed = breed;
        }
        if let Some(species) = patch.species {
            self.species = species;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            self.end_date = end_date;
        }
        if let Some(photo) = patch.photo {
            self.photo = photo;
        }
        if let Some(tribute) = patch.tribute {
            self.tribute = tribute;
        }
        if let Some(memories) = patch.memories {
            self.memories = memories;
        }
        if let Some(personality_traits) = patch.personality_traits {
            self.personality_traits = personality_traits;
        }
        if let Some(quirks) = patch.quirks {
            self.quirks = quirks;
        }
        if let Some(candles_lit) = patch.candles_lit {
            self.candles_lit = candles_lit;
        }
        if let Some(tribute_count) = patch.tribute_count {
            self.tribute_count = tribute_count;
        }
        if let Some(is_public) = patch.is_public {
            self.is_public = is_public;
        }
        self.updated_at = now_ms();
    }
}

/// Input for a new memorial. Missing fields get sensible defaults when the
/// record is built.
#[derive(Debug, Clone, Default)]
pub struct MemorialDraft {
    pub name: Option<String>,
    pub breed: Option<String>,
    pub species: Option<Species>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub photo: Option<String>,
    pub tribute: Option<String>,
    pub memories: Vec<String>,
    pub personality_traits: Vec<String>,
    pub quirks: Vec<String>,
    pub is_public: bool,
}

/// Partial update for a memorial. Identity and lifecycle fields (`id`,
/// `created_at`, `updated_at`) are deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct MemorialPatch {
    pub name: Option<String>,
    pub breed: Option<String>,
    pub species: Option<Species>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub photo: Option<String>,
    pub tribute: Option<String>,
    pub memories: Option<Vec<String>>,
    pub personality_traits: Option<Vec<String>>,
    pub quirks: Option<Vec<String>>,
    pub candles_lit: Option<u32>,
    pub tribute_count: Option<u32>,
    pub is_public: Option<bool>,
}
