use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use deck_core::errors::DeckError;

#[derive(Debug)]
pub struct DeckAxumError(pub anyhow::Error);

impl From<anyhow::Error> for DeckAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<DeckError> for DeckAxumError {
    fn from(e: DeckError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for DeckAxumError {
    fn into_response(self) -> Response {
        // If it’s a DeckError (even if wrapped by anyhow contexts), preserve Feathers-ish fields
        if let Some(deck) = self.0.chain().find_map(|e| e.downcast_ref::<DeckError>()) {
            if deck.code() >= 500 {
                tracing::error!(error = ?self.0, "request failed");
            }
            let safe = deck.sanitize_for_client();
            let status =
                StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, Json(safe.to_json())).into_response();
        }

        // Fallback: wrap anything else as a GeneralError
        tracing::error!(error = ?self.0, "unhandled error");
        let safe = DeckError::general_error(self.0.to_string()).with_reason("internal_error");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(safe.to_json())).into_response()
    }
}
