//! Daily quota ledger.
//!
//! One marker object per (calendar day, user) at `<prefix>-YYYYMMDD/<user>`.
//! The day is taken in a fixed zone from [`DeckLimits::quota_offset`], not UTC.
//!
//! Stores with a conditional put get an atomic check-and-mark. Everything
//! else uses `head` then `put`, which is best-effort: two requests inside
//! that window can both be granted.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use deck_blob::{BlobStore, ConditionalPut, PutOptions};
use serde::Serialize;
use tracing::{debug, warn};

use crate::bail_deck;
use crate::deck::rfc3339_millis;
use crate::errors::{DeckError, DeckResult};
use crate::DeckLimits;

const MAX_USER_ID_BYTES: usize = 128;

/// Outcome of [`QuotaLedger::check_and_mark`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaCheck {
    /// `true` when today's quota was already spent (or could not be confirmed)
    pub used: bool,
    pub date: NaiveDate,
}

impl QuotaCheck {
    /// `YYYY-MM-DD`
    pub fn date_iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Body of a quota marker
#[derive(Debug, Clone, Serialize)]
pub struct QuotaRecord {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub date: String,
    #[serde(rename = "markedAt", with = "rfc3339_millis")]
    pub marked_at: DateTime<Utc>,
}

/// Trim and validate a caller-supplied user id; it becomes a key segment.
pub fn validate_user_id(raw: Option<&str>) -> DeckResult<String> {
    let user_id = raw.map(str::trim).unwrap_or_default();

    if user_id.is_empty() {
        bail_deck!(bad_request, "missing_user", "userId is required");
    }
    if user_id.len() > MAX_USER_ID_BYTES {
        return Err(DeckError::bad_request("userId is too long")
            .with_reason("invalid_user")
            .with_field("limit", MAX_USER_ID_BYTES)
            .into_anyhow());
    }
    if user_id.contains(['/', '\\'])
        || user_id.contains("..")
        || user_id.chars().any(char::is_control)
    {
        bail_deck!(bad_request, "invalid_user", "userId contains forbidden characters");
    }

    Ok(user_id.to_string())
}

#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn BlobStore>,
    limits: DeckLimits,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn BlobStore>, limits: DeckLimits) -> Self {
        Self { store, limits }
    }

    /// Calendar day of `now` in the quota zone
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.limits.quota_offset).date_naive()
    }

    pub fn record_key(&self, date: NaiveDate, user_id: &str) -> String {
        format!(
            "{}-{}/{}",
            self.limits.quota_key_prefix,
            date.format("%Y%m%d"),
            user_id
        )
    }

    pub async fn check_and_mark(&self, user_id: &str) -> DeckResult<QuotaCheck> {
        self.check_and_mark_at(user_id, Utc::now()).await
    }

    /// Test `user_id`'s quota for the day containing `now` and consume it if free.
    ///
    /// `user_id` must already be validated with [`validate_user_id`].
    pub async fn check_and_mark_at(&self, user_id: &str, now: DateTime<Utc>) -> DeckResult<QuotaCheck> {
        let date = self.local_date(now);
        let key = self.record_key(date, user_id);

        let record = QuotaRecord {
            user_id: user_id.to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            marked_at: now,
        };
        let body = serde_json::to_vec(&record).map_err(|e| {
            DeckError::general_error("Failed to encode quota record")
                .with_source(e.into())
                .into_anyhow()
        })?;
        let options = PutOptions::json_no_store().with_metadata("via", "daily-quota");

        let used = if self.store.capabilities().conditional_put {
            self.mark_conditional(&key, body, options).await
        } else {
            self.mark_two_step(&key, body, options).await?
        };

        debug!(user_id, %date, used, "quota check");
        Ok(QuotaCheck { used, date })
    }

    async fn mark_conditional(&self, key: &str, body: Vec<u8>, options: PutOptions) -> bool {
        match self.store.put_if_absent(key, Bytes::from(body), options).await {
            Ok(ConditionalPut::Created(_)) => false,
            Ok(ConditionalPut::AlreadyExists) => true,
            Err(err) => {
                warn!(key, error = %err, "conditional quota mark failed; treating as used");
                true
            }
        }
    }

    async fn mark_two_step(&self, key: &str, body: Vec<u8>, options: PutOptions) -> DeckResult<bool> {
        let existing = self.store.head(key).await.map_err(|e| {
            DeckError::bad_gateway("Failed to read quota ledger")
                .with_reason("store_head_error")
                .with_source(e.into())
                .into_anyhow()
        })?;
        if existing.is_some() {
            return Ok(true);
        }

        if let Err(err) = self.store.put(key, Bytes::from(body), options).await {
            warn!(key, error = %err, "quota mark failed; treating as used");
            return Ok(true);
        }
        Ok(false)
    }
}
