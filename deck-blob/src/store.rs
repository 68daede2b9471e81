use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{BlobError, BlobResult};

/// Core blob storage operations - must be implemented by all storage backends.
///
/// Every method is an unconditional, independent request against the backend.
/// There are no transactions: a `head` followed by a `put` leaves a window in
/// which another writer can slip in. Stores that can close that window
/// advertise [`StoreCapabilities::conditional_put`] and override
/// [`BlobStore::put_if_absent`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Get blob metadata without content. `None` when the key does not exist.
    async fn head(&self, key: &str) -> BlobResult<Option<ObjectHead>>;

    /// Get the full blob body. `None` when the key does not exist.
    async fn get(&self, key: &str) -> BlobResult<Option<GetResult>>;

    /// Store a blob, overwriting anything already at `key`
    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> BlobResult<PutResult>;

    /// Store a blob only if nothing exists at `key` yet
    async fn put_if_absent(
        &self,
        _key: &str,
        _body: Bytes,
        _options: PutOptions,
    ) -> BlobResult<ConditionalPut> {
        Err(BlobError::Unsupported)
    }

    /// Get store capabilities
    fn capabilities(&self) -> StoreCapabilities;
}

/// HTTP-ish metadata attached to a put
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl PutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `application/json` body that must never be served from a cache
    pub fn json_no_store() -> Self {
        Self::new()
            .with_content_type("application/json")
            .with_cache_control("no-store")
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_cache_control<S: Into<String>>(mut self, cache_control: S) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }

    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Outcome of [`BlobStore::put_if_absent`]
#[derive(Debug, Clone)]
pub enum ConditionalPut {
    Created(PutResult),
    AlreadyExists,
}

/// Result of a get operation
#[derive(Debug, Clone)]
pub struct GetResult {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Metadata about a blob
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<i64>,
}

/// Store capabilities
#[derive(Debug, Clone, Default)]
pub struct StoreCapabilities {
    pub conditional_put: bool,
}

impl StoreCapabilities {
    pub fn basic() -> Self {
        Self {
            conditional_put: false,
        }
    }

    pub fn with_conditional_put(mut self) -> Self {
        self.conditional_put = true;
        self
    }
}
