use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{
    BlobError, BlobResult, BlobStore, ConditionalPut, GetResult, ObjectHead, PutOptions, PutResult,
    StoreCapabilities,
};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    options: PutOptions,
    etag: String,
    last_modified: i64,
}

#[derive(Default)]
struct Faults {
    put_keys: BTreeSet<String>,
    head: bool,
    get: bool,
}

/// In-memory store for local runs and tests.
///
/// Cheap to clone; clones share the same objects. Conditional put is off by
/// default so the store behaves like a plain bucket.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    faults: Arc<Mutex<Faults>>,
    calls: Arc<AtomicUsize>,
    conditional_put: bool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise and honour `put_if_absent`
    pub fn with_conditional_put(mut self) -> Self {
        self.conditional_put = true;
        self
    }

    /// Make every `put` whose key contains `fragment` fail
    pub fn fail_puts_containing<S: Into<String>>(&self, fragment: S) {
        self.faults.lock().put_keys.insert(fragment.into());
    }

    pub fn fail_heads(&self, fail: bool) {
        self.faults.lock().head = fail;
    }

    pub fn fail_gets(&self, fail: bool) {
        self.faults.lock().get = fail;
    }

    /// Number of backend calls made so far (head, get, put, put_if_absent)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Options the object at `key` was last written with
    pub fn options_of(&self, key: &str) -> Option<PutOptions> {
        self.objects.lock().get(key).map(|o| o.options.clone())
    }

    /// Write raw bytes without counting the call or applying faults
    pub fn seed(&self, key: &str, body: impl Into<Bytes>) {
        let object = Self::object(body.into(), PutOptions::json_no_store());
        self.objects.lock().insert(key.to_string(), object);
    }

    fn object(body: Bytes, options: PutOptions) -> StoredObject {
        StoredObject {
            body,
            options,
            etag: format!("\"{}\"", Uuid::new_v4().simple()),
            last_modified: chrono::Utc::now().timestamp(),
        }
    }

    fn put_should_fail(&self, key: &str) -> bool {
        self.faults
            .lock()
            .put_keys
            .iter()
            .any(|fragment| key.contains(fragment.as_str()))
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn head(&self, key: &str) -> BlobResult<Option<ObjectHead>> {
        self.record_call();
        if self.faults.lock().head {
            return Err(BlobError::unavailable(format!("head {key}: injected failure")));
        }

        Ok(self.objects.lock().get(key).map(|o| ObjectHead {
            size_bytes: o.body.len() as u64,
            content_type: o.options.content_type.clone(),
            etag: Some(o.etag.clone()),
            last_modified: Some(o.last_modified),
        }))
    }

    async fn get(&self, key: &str) -> BlobResult<Option<GetResult>> {
        self.record_call();
        if self.faults.lock().get {
            return Err(BlobError::unavailable(format!("get {key}: injected failure")));
        }

        Ok(self.objects.lock().get(key).map(|o| GetResult {
            body: o.body.clone(),
            content_type: o.options.content_type.clone(),
            etag: Some(o.etag.clone()),
        }))
    }

    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> BlobResult<PutResult> {
        self.record_call();
        if self.put_should_fail(key) {
            return Err(BlobError::unavailable(format!("put {key}: injected failure")));
        }

        let size_bytes = body.len() as u64;
        let object = Self::object(body, options);
        let etag = Some(object.etag.clone());
        self.objects.lock().insert(key.to_string(), object);

        Ok(PutResult { etag, size_bytes })
    }

    async fn put_if_absent(
        &self,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> BlobResult<ConditionalPut> {
        if !self.conditional_put {
            return Err(BlobError::Unsupported);
        }
        self.record_call();
        if self.put_should_fail(key) {
            return Err(BlobError::unavailable(format!("put {key}: injected failure")));
        }

        let mut objects = self.objects.lock();
        if objects.contains_key(key) {
            return Ok(ConditionalPut::AlreadyExists);
        }

        let size_bytes = body.len() as u64;
        let object = Self::object(body, options);
        let etag = Some(object.etag.clone());
        objects.insert(key.to_string(), object);

        Ok(ConditionalPut::Created(PutResult { etag, size_bytes }))
    }

    fn capabilities(&self) -> StoreCapabilities {
        if self.conditional_put {
            StoreCapabilities::basic().with_conditional_put()
        } else {
            StoreCapabilities::basic()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_head_and_get() {
        let store = MemoryBlobStore::new();

        let put = store
            .put("cache/a.json", Bytes::from_static(b"{}"), PutOptions::json_no_store())
            .await
            .unwrap();
        assert_eq!(put.size_bytes, 2);

        let head = store.head("cache/a.json").await.unwrap().unwrap();
        assert_eq!(head.content_type.as_deref(), Some("application/json"));
        assert_eq!(head.etag, put.etag);

        let got = store.get("cache/a.json").await.unwrap().unwrap();
        assert_eq!(&got.body[..], b"{}");
        assert!(store.head("missing").await.unwrap().is_none());
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_whole_object() {
        let store = MemoryBlobStore::new();
        store.put("k", Bytes::from_static(b"first"), PutOptions::new()).await.unwrap();
        store.put("k", Bytes::from_static(b"2"), PutOptions::new()).await.unwrap();

        let got = store.get("k").await.unwrap().unwrap();
        assert_eq!(&got.body[..], b"2");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_put_if_absent_requires_capability() {
        let plain = MemoryBlobStore::new();
        let res = plain.put_if_absent("k", Bytes::new(), PutOptions::new()).await;
        assert!(matches!(res, Err(BlobError::Unsupported)));
        assert!(!plain.capabilities().conditional_put);

        let conditional = MemoryBlobStore::new().with_conditional_put();
        assert!(conditional.capabilities().conditional_put);
        let first = conditional.put_if_absent("k", Bytes::new(), PutOptions::new()).await;
        assert!(matches!(first, Ok(ConditionalPut::Created(_))));
        let second = conditional.put_if_absent("k", Bytes::new(), PutOptions::new()).await;
        assert!(matches!(second, Ok(ConditionalPut::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryBlobStore::new();
        store.fail_puts_containing("money");

        let bad = store.put("cache/card-ids-money.json", Bytes::new(), PutOptions::new()).await;
        assert!(matches!(bad, Err(BlobError::Unavailable { .. })));
        tokio_test::assert_ok!(
            store.put("cache/card-ids-love.json", Bytes::new(), PutOptions::new()).await
        );

        store.fail_heads(true);
        assert!(store.head("cache/card-ids-love.json").await.is_err());
        store.fail_gets(true);
        assert!(store.get("cache/card-ids-love.json").await.is_err());
        assert_eq!(store.call_count(), 4);
    }
}
