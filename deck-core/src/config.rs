//! # Configuration
//!
//! A minimal string key/value store, mirroring Feathers' `app.set()` /
//! `app.get()`, plus the typed [`DeckLimits`] the core actually runs on.
//!
//! ```rust
//! use deck_core::{DeckConfig, DeckLimits};
//!
//! let mut config = DeckConfig::new();
//! config.set("draw.max_n", "10");
//!
//! let limits = DeckLimits::from_snapshot(&config.snapshot());
//! assert_eq!(limits.max_draw, 10);
//! assert_eq!(limits.max_ids_per_deck, 5000);
//! ```
//!
//! ## Environment overrides
//! [`DeckConfig::load_env_config`] maps `DECKS__DRAW__MAX_N=25` to `draw.max_n`.

use std::collections::HashMap;

use chrono::{FixedOffset, Offset, Utc};

pub const MAX_DECKS_PER_BATCH: &str = "decks.max_per_batch";
pub const MAX_IDS_PER_DECK: &str = "decks.max_ids";
pub const MAX_PAYLOAD_BYTES: &str = "decks.max_payload_bytes";
pub const MAX_DRAW: &str = "draw.max_n";
pub const MAX_DAILY_DRAW: &str = "draw.daily_max_n";
pub const QUOTA_UTC_OFFSET_MINUTES: &str = "quota.utc_offset_minutes";
pub const QUOTA_KEY_PREFIX: &str = "quota.key_prefix";

#[derive(Debug, Default)]
pub struct DeckConfig {
    values: HashMap<String, String>,
}

impl DeckConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy every `PREFIX...` environment variable into the store.
    ///
    /// `DECKS__QUOTA__UTC_OFFSET_MINUTES` with prefix `DECKS__` becomes
    /// `quota.utc_offset_minutes`.
    pub fn load_env_config(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    fn load_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
            }
        }
    }

    pub fn snapshot(&self) -> DeckConfigSnapshot {
        DeckConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeckConfigSnapshot {
    map: HashMap<String, String>,
}

impl DeckConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.trim().parse::<i32>().ok())
    }
}

/// Resource ceilings and business rules for the deck cache, draws and quota
#[derive(Debug, Clone)]
pub struct DeckLimits {
    /// Deck entries accepted in one batch update
    pub max_decks_per_batch: usize,

    /// Distinct ids a single deck may hold
    pub max_ids_per_deck: usize,

    /// Ceiling for the estimated batch payload and for each serialized deck document
    pub max_payload_bytes: usize,

    /// `n` ceiling on the ungated draw
    pub max_draw: usize,

    /// `n` ceiling on the quota-gated draw (one card per day)
    pub max_daily_draw: usize,

    /// Zone whose calendar day scopes the daily quota
    pub quota_offset: FixedOffset,

    /// First key segment of quota records: `<prefix>-YYYYMMDD/<user>`
    pub quota_key_prefix: String,
}

const DEFAULT_UTC_OFFSET_MINUTES: i32 = 8 * 60;

fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap_or_else(|| Utc.fix())
}

impl Default for DeckLimits {
    fn default() -> Self {
        Self {
            max_decks_per_batch: 20,
            max_ids_per_deck: 5000,
            max_payload_bytes: 512 * 1024, // 512KB
            max_draw: 50,
            max_daily_draw: 1,
            quota_offset: default_offset(),
            quota_key_prefix: "draw".to_string(),
        }
    }
}

impl DeckLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every known key, falling back to the default for missing or malformed values.
    pub fn from_snapshot(config: &DeckConfigSnapshot) -> Self {
        let defaults = Self::default();

        let quota_offset = config
            .get_i32(QUOTA_UTC_OFFSET_MINUTES)
            .and_then(|minutes| minutes.checked_mul(60))
            .and_then(FixedOffset::east_opt)
            .unwrap_or(defaults.quota_offset);

        let quota_key_prefix = config
            .get_string(QUOTA_KEY_PREFIX)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty() && !p.contains('/'))
            .unwrap_or(defaults.quota_key_prefix);

        Self {
            max_decks_per_batch: config
                .get_usize(MAX_DECKS_PER_BATCH)
                .unwrap_or(defaults.max_decks_per_batch),
            max_ids_per_deck: config
                .get_usize(MAX_IDS_PER_DECK)
                .unwrap_or(defaults.max_ids_per_deck),
            max_payload_bytes: config
                .get_usize(MAX_PAYLOAD_BYTES)
                .unwrap_or(defaults.max_payload_bytes),
            max_draw: config.get_usize(MAX_DRAW).unwrap_or(defaults.max_draw).max(1),
            max_daily_draw: config
                .get_usize(MAX_DAILY_DRAW)
                .unwrap_or(defaults.max_daily_draw)
                .max(1),
            quota_offset,
            quota_key_prefix,
        }
    }

    pub fn with_max_decks_per_batch(mut self, max: usize) -> Self {
        self.max_decks_per_batch = max;
        self
    }

    pub fn with_max_ids_per_deck(mut self, max: usize) -> Self {
        self.max_ids_per_deck = max;
        self
    }

    pub fn with_max_payload_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    pub fn with_max_draw(mut self, max: usize) -> Self {
        self.max_draw = max.max(1);
        self
    }

    pub fn with_max_daily_draw(mut self, max: usize) -> Self {
        self.max_daily_draw = max.max(1);
        self
    }

    pub fn with_quota_offset(mut self, offset: FixedOffset) -> Self {
        self.quota_offset = offset;
        self
    }
}
