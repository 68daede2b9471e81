pub mod config;

use std::sync::Arc;

use anyhow::Result;
use deck_axum::DeckAxumApp;
use deck_blob::{BlobStore, MemoryBlobStore, S3CompatibleStore};
use deck_core::{DeckApp, DeckConfig};

/// Open the blob store named by `store.backend`
pub async fn open_store(config: &DeckConfig) -> Result<Arc<dyn BlobStore>> {
    match config.get(config::STORE_BACKEND) {
        Some("s3") => {
            let store = S3CompatibleStore::from_env().await?;
            tracing::info!(conditional_put = store.capabilities().conditional_put, "using S3 blob store");
            Ok(Arc::new(store))
        }
        _ => {
            tracing::warn!("using in-memory blob store; data is lost on restart");
            Ok(Arc::new(MemoryBlobStore::new()))
        }
    }
}

pub async fn build() -> Result<DeckAxumApp> {
    let mut cfg = DeckConfig::new();
    config::config(&mut cfg)?;

    let store = open_store(&cfg).await?;
    let app = DeckApp::new(store, &cfg);
    let limits = app.limits();
    tracing::info!(
        max_draw = limits.max_draw,
        max_daily_draw = limits.max_daily_draw,
        quota_offset = %limits.quota_offset,
        "deck service configured"
    );

    let token = cfg.get(config::UPLOAD_TOKEN).map(str::to_string);
    Ok(deck_axum::axum(app, token.as_deref()))
}
