use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing, Json, Router,
};
use deck_core::{cache::DeckEntry, BatchStatus, DeckError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::middlewares::UploadAuth;
use crate::{DeckAxumError, DeckAxumState};

/// Success body: `{"ok": true, ...fields}`
#[derive(Serialize)]
struct OkBody<T> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Json<OkBody<T>> {
    Json(OkBody { ok: true, body })
}

#[derive(Debug, Default, Deserialize)]
pub struct DrawQuery {
    pub deck: Option<String>,
    pub n: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

fn map_query_rejection(rejection: QueryRejection) -> DeckAxumError {
    DeckError::bad_request("Failed to parse the query string")
        .with_reason("invalid_query")
        .with_errors(json!({"_query": [rejection.to_string()]}))
        .into()
}

fn require_json_content_type(headers: &HeaderMap) -> Result<(), DeckAxumError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !content_type.to_ascii_lowercase().contains("application/json") {
        return Err(DeckError::bad_request("Content-Type must be application/json")
            .with_reason("content_type_must_be_application_json")
            .with_field("got", content_type)
            .into());
    }
    Ok(())
}

fn parse_json_body(body: &[u8]) -> Result<Value, DeckAxumError> {
    serde_json::from_slice(body).map_err(|e| {
        DeckError::bad_request("Failed to parse the request body as JSON")
            .with_reason("invalid_json")
            .with_errors(json!({"_schema": [e.to_string()]}))
            .into()
    })
}

pub async fn healthz() -> Json<Value> {
    Json(json!({"ok": true}))
}

/// `POST /updateCacheCardId`: 200 when every deck saved, 207 otherwise.
pub async fn update_cache(
    _auth: UploadAuth,
    State(state): State<DeckAxumState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), DeckAxumError> {
    require_json_content_type(&headers)?;
    let value = parse_json_body(&body)?;

    let cache = state.app.cache();
    let encoded_len = value.to_string().len();
    let entries = DeckEntry::list_from_value(value);
    cache.check_batch(&entries, encoded_len)?;

    let outcome = cache.update_batch(entries).await;
    let status = match outcome.status() {
        BatchStatus::Complete => StatusCode::OK,
        BatchStatus::Partial | BatchStatus::NoneSaved => StatusCode::MULTI_STATUS,
    };

    let body = serde_json::to_value(&outcome)
        .map_err(|e| DeckError::general_error("Failed to encode batch outcome").with_source(e.into()))?;
    Ok((status, Json(body)))
}

/// `GET /getCardId?deck=&n=`
pub async fn get_card_ids(
    State(state): State<DeckAxumState>,
    query: Result<Query<DrawQuery>, QueryRejection>,
) -> Result<Json<impl Serialize>, DeckAxumError> {
    let Query(query) = query.map_err(map_query_rejection)?;
    let drawn = state
        .app
        .draws()
        .draw(query.deck.as_deref(), query.n.as_deref())
        .await?;
    Ok(ok(drawn))
}

/// `GET /drawDaily?userId=&deck=&n=`
pub async fn draw_daily(
    State(state): State<DeckAxumState>,
    query: Result<Query<DrawQuery>, QueryRejection>,
) -> Result<Json<impl Serialize>, DeckAxumError> {
    let Query(query) = query.map_err(map_query_rejection)?;
    let drawn = state
        .app
        .draws()
        .draw_gated(
            query.user_id.as_deref(),
            query.deck.as_deref(),
            query.n.as_deref(),
        )
        .await?;
    Ok(ok(drawn))
}

pub async fn not_found() -> DeckAxumError {
    DeckError::not_found("Route not found")
        .with_reason("not_found")
        .into()
}

pub fn deck_router(state: DeckAxumState) -> Router<()> {
    Router::new()
        .route("/healthz", routing::get(healthz))
        .route("/updateCacheCardId", routing::post(update_cache))
        .route("/getCardId", routing::get(get_card_ids))
        .route("/drawDaily", routing::get(draw_daily))
        .method_not_allowed_fallback(not_found)
        .fallback(not_found)
        .with_state(state)
}
