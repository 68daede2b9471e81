//! Deck cache: one JSON document per deck in the blob store.
//!
//! Writes are whole-document overwrites (last writer wins). Reads are a
//! single `get` with no local caching between requests.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use deck_blob::{BlobStore, PutOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bail_deck;
use crate::deck::{coerce_id, is_falsy, iso_millis, DeckName, DeckPoolDocument, StoredPool};
use crate::errors::{DeckError, DeckResult};
use crate::DeckLimits;

/// One raw batch entry as it arrives from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeckEntry {
    #[serde(default, alias = "deckName")]
    pub deck: Value,
    #[serde(default)]
    pub ids: Value,
}

impl DeckEntry {
    pub fn new(deck: impl Into<Value>, ids: impl Into<Value>) -> Self {
        Self {
            deck: deck.into(),
            ids: ids.into(),
        }
    }

    /// Accept either a single `{deck, ids}` object or an array of them.
    ///
    /// Array elements that are not objects become empty entries so they
    /// surface as `invalid_deck` failures at their index. A lone falsy entry,
    /// bare or as the only array element, yields no entries at all.
    pub fn list_from_value(body: Value) -> Vec<DeckEntry> {
        let items = match body {
            Value::Array(items) => items,
            other => vec![other],
        };
        if let [only] = items.as_slice() {
            if is_falsy(only) {
                return Vec::new();
            }
        }
        items.into_iter().map(Self::from_item).collect()
    }

    fn from_item(item: Value) -> DeckEntry {
        match item {
            Value::Object(_) => serde_json::from_value(item).unwrap_or_default(),
            _ => DeckEntry::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidDeck,
    EmptyIdsArray,
    TooManyIds,
    DeckPayloadTooLarge,
    StorePutError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedDeck {
    pub deck: DeckName,
    pub count: usize,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// The deck name as received (trimmed), even when it is not a known deck
    pub deck: String,
    pub reason: FailureReason,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl BatchFailure {
    fn new(deck: impl Into<String>, reason: FailureReason, index: usize) -> Self {
        Self {
            deck: deck.into(),
            reason,
            index,
            limit: None,
            detail: None,
        }
    }

    fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every entry saved
    Complete,
    /// Some saved, some failed
    Partial,
    /// Nothing saved
    NoneSaved,
}

/// Result of [`DeckCache::update_batch`]. Serializes as `{ok, saved, errors}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    #[serde(rename = "ok")]
    pub fully_ok: bool,
    pub saved: Vec<SavedDeck>,
    #[serde(rename = "errors")]
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn status(&self) -> BatchStatus {
        match (self.failures.is_empty(), self.saved.is_empty()) {
            (true, _) => BatchStatus::Complete,
            (false, false) => BatchStatus::Partial,
            (false, true) => BatchStatus::NoneSaved,
        }
    }

    fn push_failure(&mut self, failure: BatchFailure) {
        self.failures.push(failure);
        self.fully_ok = false;
    }
}

/// A deck's pool as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckPool {
    pub deck: DeckName,
    pub ids: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeckPool {
    pub fn updated_at_iso(&self) -> Option<String> {
        self.updated_at.as_ref().map(iso_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolRead {
    /// No document was ever written for this deck
    NotFound,
    /// The document exists but holds no usable ids
    Empty,
    Found(DeckPool),
}

/// Normalize raw ids: coerce to strings, trim, drop empties, dedupe keeping first occurrence.
pub fn normalize_ids(raw: &Value) -> Vec<String> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .filter_map(coerce_id)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[derive(Clone)]
pub struct DeckCache {
    store: Arc<dyn BlobStore>,
    limits: DeckLimits,
}

impl DeckCache {
    pub fn new(store: Arc<dyn BlobStore>, limits: DeckLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> &DeckLimits {
        &self.limits
    }

    /// Batch-level guards applied before any storage call.
    ///
    /// `encoded_len` is the length of the decoded body re-serialized as compact
    /// JSON, so whitespace in the request does not count. The size estimate
    /// mirrors the base64-ish `len * 3 / 4` the upload path uses.
    pub fn check_batch(&self, entries: &[DeckEntry], encoded_len: usize) -> DeckResult<()> {
        if entries.is_empty() {
            bail_deck!(bad_request, "empty_payload", "Batch payload is empty");
        }

        let estimated = encoded_len.saturating_mul(3) / 4;
        if estimated > self.limits.max_payload_bytes {
            return Err(DeckError::payload_too_large("Batch payload too large")
                .with_reason("payload_too_large")
                .with_field("limit", self.limits.max_payload_bytes)
                .into_anyhow());
        }

        if entries.len() > self.limits.max_decks_per_batch {
            return Err(DeckError::bad_request("Too many decks in one batch")
                .with_reason("too_many_decks")
                .with_field("limit", self.limits.max_decks_per_batch)
                .into_anyhow());
        }

        Ok(())
    }

    /// Validate and overwrite each deck independently, in input order.
    pub async fn update_batch(&self, entries: Vec<DeckEntry>) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            fully_ok: true,
            ..BatchOutcome::default()
        };

        for (index, entry) in entries.into_iter().enumerate() {
            match self.update_one(index, entry).await {
                Ok(saved) => outcome.saved.push(saved),
                Err(failure) => {
                    warn!(
                        deck = %failure.deck,
                        index,
                        reason = ?failure.reason,
                        "deck cache entry rejected"
                    );
                    outcome.push_failure(failure);
                }
            }
        }

        info!(
            saved = outcome.saved.len(),
            failed = outcome.failures.len(),
            "deck cache batch update"
        );
        outcome
    }

    async fn update_one(&self, index: usize, entry: DeckEntry) -> Result<SavedDeck, BatchFailure> {
        let raw_deck = coerce_id(&entry.deck).unwrap_or_default();
        let Some(deck) = DeckName::parse(&raw_deck) else {
            return Err(BatchFailure::new(raw_deck, FailureReason::InvalidDeck, index));
        };

        let ids = normalize_ids(&entry.ids);
        if ids.is_empty() {
            return Err(BatchFailure::new(deck.as_str(), FailureReason::EmptyIdsArray, index));
        }
        if ids.len() > self.limits.max_ids_per_deck {
            return Err(BatchFailure::new(deck.as_str(), FailureReason::TooManyIds, index)
                .with_limit(self.limits.max_ids_per_deck));
        }

        let count = ids.len();
        let document = DeckPoolDocument::new(ids, Utc::now());
        let payload = serde_json::to_vec(&document).map_err(|e| {
            BatchFailure::new(deck.as_str(), FailureReason::StorePutError, index)
                .with_detail(e.to_string())
        })?;

        if payload.len() > self.limits.max_payload_bytes {
            return Err(
                BatchFailure::new(deck.as_str(), FailureReason::DeckPayloadTooLarge, index)
                    .with_limit(self.limits.max_payload_bytes),
            );
        }

        let key = deck.cache_key();
        let options = PutOptions::json_no_store().with_metadata("via", "batch-update");
        match self.store.put(&key, Bytes::from(payload), options).await {
            Ok(_) => Ok(SavedDeck { deck, count, key }),
            Err(err) => Err(
                BatchFailure::new(deck.as_str(), FailureReason::StorePutError, index)
                    .with_detail(err.to_string()),
            ),
        }
    }

    /// Fetch the current pool of `deck`.
    pub async fn read_pool(&self, deck: DeckName) -> DeckResult<PoolRead> {
        let key = deck.cache_key();
        let found = self.store.get(&key).await.map_err(|e| {
            DeckError::bad_gateway("Failed to read deck cache")
                .with_reason("store_get_error")
                .with_field("deck", deck.as_str())
                .with_source(e.into())
                .into_anyhow()
        })?;

        let Some(found) = found else {
            debug!(deck = %deck, "deck cache miss");
            return Ok(PoolRead::NotFound);
        };

        let stored: StoredPool = serde_json::from_slice(&found.body).map_err(|e| {
            DeckError::general_error("Deck cache document is corrupt")
                .with_reason("cache_corrupt")
                .with_field("deck", deck.as_str())
                .with_source(e.into())
                .into_anyhow()
        })?;

        let ids: Vec<String> = match &stored.ids {
            Value::Array(items) => items.iter().filter_map(coerce_id).collect(),
            _ => Vec::new(),
        };
        if ids.is_empty() {
            return Ok(PoolRead::Empty);
        }

        Ok(PoolRead::Found(DeckPool {
            deck,
            ids,
            updated_at: stored.updated_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_blob::MemoryBlobStore;
    use serde_json::json;

    fn cache_with(store: &MemoryBlobStore, limits: DeckLimits) -> DeckCache {
        DeckCache::new(Arc::new(store.clone()), limits)
    }

    #[test]
    fn normalize_trims_dedupes_and_drops_blanks() {
        let ids = normalize_ids(&json!([" a", "a", "b", "", null, 7, "7", false]));
        assert_eq!(ids, vec!["a", "b", "7"]);
        assert!(normalize_ids(&json!("a,b")).is_empty());
    }

    #[test]
    fn list_from_value_accepts_single_object_and_arrays() {
        let one = DeckEntry::list_from_value(json!({"deck": "love", "ids": ["a"]}));
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].deck, json!("love"));

        let aliased = DeckEntry::list_from_value(json!([{"deckName": "money", "ids": []}, null, 3]));
        assert_eq!(aliased.len(), 3);
        assert_eq!(aliased[0].deck, json!("money"));
        assert_eq!(aliased[1].deck, Value::Null);

        assert!(DeckEntry::list_from_value(Value::Null).is_empty());
    }

    #[test]
    fn lone_falsy_entry_is_an_empty_batch() {
        for body in [json!([null]), json!([false]), json!([0]), json!([""]), json!(false), json!(0), json!("")] {
            assert!(DeckEntry::list_from_value(body.clone()).is_empty(), "{body}");
        }

        assert_eq!(DeckEntry::list_from_value(json!([null, null])).len(), 2);
        assert_eq!(DeckEntry::list_from_value(json!([true])).len(), 1);
        assert_eq!(DeckEntry::list_from_value(json!("love")).len(), 1);
    }

    #[test]
    fn zero_ids_are_dropped() {
        let ids = normalize_ids(&json!([0, 1.5, "a", "b", "c", "d"]));
        assert_eq!(ids, vec!["1.5", "a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn duplicate_ids_are_counted_once() {
        let store = MemoryBlobStore::new();
        let cache = cache_with(&store, DeckLimits::default());

        let outcome = cache
            .update_batch(vec![DeckEntry::new("love", json!(["a", "a", "b"]))])
            .await;

        assert!(outcome.fully_ok);
        assert_eq!(outcome.status(), BatchStatus::Complete);
        assert_eq!(
            outcome.saved,
            vec![SavedDeck {
                deck: DeckName::Love,
                count: 2,
                key: "cache/card-ids-love.json".to_string()
            }]
        );

        let options = store.options_of("cache/card-ids-love.json").unwrap();
        assert_eq!(options.cache_control.as_deref(), Some("no-store"));
        assert_eq!(options.metadata.get("via").map(String::as_str), Some("batch-update"));
    }

    #[tokio::test]
    async fn every_entry_lands_in_exactly_one_list() {
        let store = MemoryBlobStore::new();
        store.fail_puts_containing("career");
        let cache = cache_with(&store, DeckLimits::default().with_max_ids_per_deck(3));

        let outcome = cache
            .update_batch(vec![
                DeckEntry::new("love", json!(["a"])),
                DeckEntry::new("tarot", json!(["a"])),
                DeckEntry::new("money", json!([" ", null])),
                DeckEntry::new("daily", json!(["1", "2", "3", "4"])),
                DeckEntry::new("career", json!(["x"])),
                DeckEntry::new("daily", json!(["1", "2", "3", "3"])),
            ])
            .await;

        assert!(!outcome.fully_ok);
        assert_eq!(outcome.status(), BatchStatus::Partial);
        assert_eq!(outcome.saved.len() + outcome.failures.len(), 6);

        let reasons: Vec<_> = outcome.failures.iter().map(|f| (f.index, f.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (1, FailureReason::InvalidDeck),
                (2, FailureReason::EmptyIdsArray),
                (3, FailureReason::TooManyIds),
                (4, FailureReason::StorePutError),
            ]
        );
        assert_eq!(outcome.failures[1].deck, "money");
        assert_eq!(outcome.failures[0].deck, "tarot");
        assert_eq!(outcome.failures[2].limit, Some(3));
        assert!(outcome.failures[3].detail.is_some());

        let saved: Vec<_> = outcome.saved.iter().map(|s| (s.deck, s.count)).collect();
        assert_eq!(saved, vec![(DeckName::Love, 1), (DeckName::Daily, 3)]);
    }

    #[tokio::test]
    async fn all_failures_is_distinguishable_from_partial() {
        let store = MemoryBlobStore::new();
        let cache = cache_with(&store, DeckLimits::default());

        let outcome = cache.update_batch(vec![DeckEntry::new("nope", json!(["a"]))]).await;
        assert_eq!(outcome.status(), BatchStatus::NoneSaved);
        assert!(outcome.saved.is_empty());
        assert!(store.is_empty());

        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["errors"][0]["reason"], "invalid_deck");
    }

    #[tokio::test]
    async fn oversized_document_is_rejected_per_deck() {
        let store = MemoryBlobStore::new();
        let cache = cache_with(&store, DeckLimits::default().with_max_payload_bytes(100));

        let big: Vec<String> = (0..20).map(|i| format!("card-{i:04}")).collect();
        let outcome = cache
            .update_batch(vec![
                DeckEntry::new("love", json!(big)),
                DeckEntry::new("money", json!(["m"])),
            ])
            .await;

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].reason, FailureReason::DeckPayloadTooLarge);
        assert_eq!(outcome.saved[0].deck, DeckName::Money);
    }

    #[test]
    fn batch_guards_run_before_storage() {
        let store = MemoryBlobStore::new();
        let cache = cache_with(
            &store,
            DeckLimits::default()
                .with_max_decks_per_batch(2)
                .with_max_payload_bytes(100),
        );
        let reason = |res: DeckResult<()>| {
            let err = res.unwrap_err();
            DeckError::from_anyhow(&err).unwrap().reason().map(str::to_string)
        };

        assert_eq!(reason(cache.check_batch(&[], 10)), Some("empty_payload".into()));
        assert_eq!(
            reason(cache.check_batch(&[DeckEntry::default()], 200)),
            Some("payload_too_large".into())
        );
        assert_eq!(
            reason(cache.check_batch(&vec![DeckEntry::default(); 3], 10)),
            Some("too_many_decks".into())
        );
        assert!(cache.check_batch(&[DeckEntry::default()], 133).is_ok());
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn read_pool_signals() {
        let store = MemoryBlobStore::new();
        let cache = cache_with(&store, DeckLimits::default());

        assert_eq!(cache.read_pool(DeckName::Love).await.unwrap(), PoolRead::NotFound);

        store.seed("cache/card-ids-money.json", r#"{"ids": ["", null], "total": 0}"#);
        assert_eq!(cache.read_pool(DeckName::Money).await.unwrap(), PoolRead::Empty);

        store.seed("cache/card-ids-career.json", r#"{"ids": ["c1", 2]}"#);
        let PoolRead::Found(pool) = cache.read_pool(DeckName::Career).await.unwrap() else {
            panic!("expected a pool");
        };
        assert_eq!(pool.ids, vec!["c1", "2"]);
        assert_eq!(pool.updated_at, None);
    }

    #[tokio::test]
    async fn rereading_without_update_is_stable() {
        let store = MemoryBlobStore::new();
        let cache = cache_with(&store, DeckLimits::default());
        cache
            .update_batch(vec![DeckEntry::new("daily", json!(["d1", "d2", "d3"]))])
            .await;

        let first = cache.read_pool(DeckName::Daily).await.unwrap();
        let second = cache.read_pool(DeckName::Daily).await.unwrap();
        assert_eq!(first, second);
        let PoolRead::Found(pool) = first else {
            panic!("expected a pool");
        };
        assert_eq!(pool.ids, vec!["d1", "d2", "d3"]);
        assert!(pool.updated_at_iso().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn store_and_decode_failures_are_errors() {
        let store = MemoryBlobStore::new();
        let cache = cache_with(&store, DeckLimits::default());

        store.seed("cache/card-ids-love.json", "not json");
        let err = cache.read_pool(DeckName::Love).await.unwrap_err();
        assert_eq!(DeckError::from_anyhow(&err).unwrap().reason(), Some("cache_corrupt"));

        store.fail_gets(true);
        let err = cache.read_pool(DeckName::Love).await.unwrap_err();
        let deck_err = DeckError::from_anyhow(&err).unwrap();
        assert_eq!(deck_err.code(), 502);
        assert_eq!(deck_err.reason(), Some("store_get_error"));
    }
}
