use std::sync::Arc;

use deck_blob::BlobStore;

use crate::{DeckCache, DeckConfig, DeckConfigSnapshot, DeckLimits, DrawCoordinator, QuotaLedger};

struct DeckAppInner {
    config: DeckConfigSnapshot,
    limits: DeckLimits,
    cache: DeckCache,
    ledger: QuotaLedger,
    draws: DrawCoordinator,
}

/// DeckApp is the composition root of the deck draw service.
///
/// Framework-agnostic. Holds:
/// - the frozen config snapshot and the limits derived from it
/// - the deck cache
/// - the quota ledger
/// - the draw coordinator
///
/// All of them share one [`BlobStore`]. Cloning is cheap.
#[derive(Clone)]
pub struct DeckApp {
    inner: Arc<DeckAppInner>,
}

impl DeckApp {
    pub fn new(store: Arc<dyn BlobStore>, config: &DeckConfig) -> Self {
        Self::from_snapshot(store, config.snapshot())
    }

    pub fn from_snapshot(store: Arc<dyn BlobStore>, config: DeckConfigSnapshot) -> Self {
        let limits = DeckLimits::from_snapshot(&config);
        Self::build(store, config, limits)
    }

    /// Skip the config layer and run on explicit limits
    pub fn with_limits(store: Arc<dyn BlobStore>, limits: DeckLimits) -> Self {
        Self::build(store, DeckConfigSnapshot::default(), limits)
    }

    fn build(store: Arc<dyn BlobStore>, config: DeckConfigSnapshot, limits: DeckLimits) -> Self {
        let cache = DeckCache::new(store.clone(), limits.clone());
        let ledger = QuotaLedger::new(store, limits.clone());
        let draws = DrawCoordinator::new(cache.clone(), ledger.clone());

        Self {
            inner: Arc::new(DeckAppInner {
                config,
                limits,
                cache,
                ledger,
                draws,
            }),
        }
    }

    /// Feathers: `app.get(key)`
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.config.get_string(key)
    }

    pub fn config_snapshot(&self) -> &DeckConfigSnapshot {
        &self.inner.config
    }

    pub fn limits(&self) -> &DeckLimits {
        &self.inner.limits
    }

    pub fn cache(&self) -> &DeckCache {
        &self.inner.cache
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.inner.ledger
    }

    pub fn draws(&self) -> &DrawCoordinator {
        &self.inner.draws
    }
}
