use axum::http::{HeaderName, Request};
use axum::Router;
use deck_core::DeckApp;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::rest;
use crate::DeckAxumState;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct DeckAxumApp {
    pub app: DeckApp,
    pub router: Router<()>,
}

impl DeckAxumApp {
    pub fn new(state: DeckAxumState) -> Self {
        let app = state.app.clone();
        let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

        let router = rest::deck_router(state)
            // Request ID: generate UUID, include in logs, return in response
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(
                |request: &Request<axum::body::Body>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                },
            ))
            .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

        Self { app, router }
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = ?listener.local_addr().ok(), "deck service listening");
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

/// Build the HTTP app for `app`; the update route stays locked unless a token is given.
pub fn axum(app: DeckApp, upload_token: Option<&str>) -> DeckAxumApp {
    let mut state = DeckAxumState::new(app);
    if let Some(token) = upload_token {
        state = state.with_upload_token(token);
    }
    DeckAxumApp::new(state)
}
