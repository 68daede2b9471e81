//! # deck-blob: key-addressed blob storage for the deck draw service
//!
//! `deck-blob` is the storage seam underneath the deck cache and the daily
//! quota ledger. It deliberately exposes only what an object bucket offers:
//!
//! - `head(key)`: existence + metadata, no content
//! - `get(key)`: whole body, or `None`
//! - `put(key, bytes, options)`: unconditional overwrite
//! - `put_if_absent(key, bytes, options)`: only on stores that advertise it
//!
//! ```text
//! ┌─────────────────┐
//! │ DeckCache/Quota │  ← document semantics
//! ├─────────────────┤
//! │   BlobStore     │  ← storage primitives
//! └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use deck_blob::prelude::*;
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = MemoryBlobStore::new();
//! store.put("cache/card-ids-love.json", Bytes::from_static(b"{}"), PutOptions::json_no_store()).await?;
//! assert!(store.head("cache/card-ids-love.json").await?.is_some());
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
mod s3_store;
pub mod store;

pub use error::{BlobError, BlobResult};
pub use memory::MemoryBlobStore;
pub use s3_store::{S3CompatibleStore, S3Config};
pub use store::{
    BlobStore, ConditionalPut, GetResult, ObjectHead, PutOptions, PutResult, StoreCapabilities,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobError, BlobResult, BlobStore, ConditionalPut, MemoryBlobStore, PutOptions,
    };
}
