//! Bearer guard for write routes.
//!
//! Add [`UploadAuth`] as the first handler parameter; the request is refused
//! before the body is read.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use deck_core::DeckError;

use crate::{DeckAxumError, DeckAxumState};

/// Token from `Authorization: Bearer <token>`, trimmed
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Proof that the request carried the configured upload token
#[derive(Debug, Clone, Copy)]
pub struct UploadAuth;

impl FromRequestParts<DeckAxumState> for UploadAuth {
    type Rejection = DeckAxumError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &DeckAxumState,
    ) -> Result<Self, Self::Rejection> {
        let authorized = match (state.upload_token.as_deref(), bearer_token(&parts.headers)) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        };

        if !authorized {
            tracing::warn!(uri = %parts.uri, "rejected upload request");
            return Err(DeckError::not_authenticated("Missing or invalid Bearer token")
                .with_reason("unauthorized")
                .into());
        }

        Ok(UploadAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_scheme_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer  s3cret "));
        assert_eq!(bearer_token(&headers), Some("s3cret"));
    }
}
