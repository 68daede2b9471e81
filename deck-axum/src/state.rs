use std::sync::Arc;

use deck_core::DeckApp;

#[derive(Clone)]
pub struct DeckAxumState {
    pub app: DeckApp,
    /// Bearer token guarding the cache update route; `None` locks the route
    pub upload_token: Option<Arc<str>>,
}

impl DeckAxumState {
    pub fn new(app: DeckApp) -> Self {
        Self {
            app,
            upload_token: None,
        }
    }

    pub fn with_upload_token<S: AsRef<str>>(mut self, token: S) -> Self {
        let token = token.as_ref().trim();
        self.upload_token = (!token.is_empty()).then(|| Arc::from(token));
        self
    }
}
