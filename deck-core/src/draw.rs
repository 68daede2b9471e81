//! Draw coordinator: validates a draw request, reads the pool and samples it.

use serde::Serialize;
use tracing::info;

use crate::cache::{DeckCache, DeckPool, PoolRead};
use crate::errors::{DeckError, DeckResult};
use crate::quota::{validate_user_id, QuotaLedger};
use crate::{bail_deck, sampling, DeckName};

/// Deck drawn from when a gated draw names none
pub const DEFAULT_DAILY_DECK: DeckName = DeckName::Daily;

/// Pool facts reported next to the drawn ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSummary {
    pub deck: DeckName,
    pub total_in_deck: usize,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draw {
    pub ids: Vec<String>,
    #[serde(flatten)]
    pub pool: PoolSummary,
}

/// Result of a quota-gated draw. When `used` is set no pool facts are reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyDraw {
    pub used: bool,
    pub date: String,
    pub ids: Vec<String>,
    #[serde(flatten)]
    pub pool: Option<PoolSummary>,
}

/// Parse a requested count from its leading integer (`"3abc"` is 3, `"2.5"`
/// is 2). Absent, digitless or non-positive means 1; anything else is
/// clamped to `ceiling`.
pub fn parse_count(raw: Option<&str>, ceiling: usize) -> usize {
    let requested = raw.and_then(leading_integer).filter(|n| *n > 0).unwrap_or(1);
    usize::try_from(requested)
        .unwrap_or(usize::MAX)
        .min(ceiling.max(1))
}

fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = digits[..end]
        .bytes()
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_deck(raw: &str) -> DeckResult<DeckName> {
    match DeckName::from_query(raw) {
        Some(deck) => Ok(deck),
        None => Err(DeckError::bad_request("Unknown deck")
            .with_reason("invalid_deck")
            .with_field("deck", raw.trim())
            .into_anyhow()),
    }
}

#[derive(Clone)]
pub struct DrawCoordinator {
    cache: DeckCache,
    ledger: QuotaLedger,
}

impl DrawCoordinator {
    pub fn new(cache: DeckCache, ledger: QuotaLedger) -> Self {
        Self { cache, ledger }
    }

    pub fn cache(&self) -> &DeckCache {
        &self.cache
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    /// Ungated draw of up to `draw.max_n` ids from `deck`.
    pub async fn draw(&self, deck: Option<&str>, n: Option<&str>) -> DeckResult<Draw> {
        let raw_deck = deck.map(str::trim).unwrap_or_default();
        if raw_deck.is_empty() {
            bail_deck!(bad_request, "missing_deck", "deck is required");
        }
        let deck = parse_deck(raw_deck)?;
        let n = parse_count(n, self.cache.limits().max_draw);

        let pool = self.load_pool(deck).await?;
        let drawn = Self::sample_pool(pool, n);
        info!(deck = %deck, requested = n, drawn = drawn.ids.len(), "draw");
        Ok(drawn)
    }

    /// One draw per user per calendar day.
    ///
    /// Inputs are validated before the ledger is touched. Once the quota is
    /// marked it stays spent even if the pool turns out to be missing.
    pub async fn draw_gated(
        &self,
        user_id: Option<&str>,
        deck: Option<&str>,
        n: Option<&str>,
    ) -> DeckResult<DailyDraw> {
        let user_id = validate_user_id(user_id)?;
        let deck = match deck.map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => parse_deck(raw)?,
            None => DEFAULT_DAILY_DECK,
        };
        let n = parse_count(n, self.cache.limits().max_daily_draw);

        let check = self.ledger.check_and_mark(&user_id).await?;
        let date = check.date_iso();
        if check.used {
            info!(user_id = %user_id, %date, "daily draw already used");
            return Ok(DailyDraw {
                used: true,
                date,
                ids: Vec::new(),
                pool: None,
            });
        }

        let pool = self.load_pool(deck).await?;
        let Draw { ids, pool } = Self::sample_pool(pool, n);
        info!(user_id = %user_id, deck = %deck, %date, drawn = ids.len(), "daily draw");
        Ok(DailyDraw {
            used: false,
            date,
            ids,
            pool: Some(pool),
        })
    }

    async fn load_pool(&self, deck: DeckName) -> DeckResult<DeckPool> {
        match self.cache.read_pool(deck).await? {
            PoolRead::Found(pool) => Ok(pool),
            PoolRead::NotFound => Err(DeckError::not_found("No cached pool for this deck")
                .with_reason("cache_not_found")
                .with_field("deck", deck.as_str())
                .into_anyhow()),
            PoolRead::Empty => Err(DeckError::not_found("Cached pool is empty")
                .with_reason("cache_empty")
                .with_field("deck", deck.as_str())
                .into_anyhow()),
        }
    }

    fn sample_pool(pool: DeckPool, n: usize) -> Draw {
        let summary = PoolSummary {
            deck: pool.deck,
            total_in_deck: pool.ids.len(),
            updated_at: pool.updated_at_iso(),
        };
        let count = n.min(pool.ids.len());
        Draw {
            ids: sampling::sample(pool.ids, count),
            pool: summary,
        }
    }
}
