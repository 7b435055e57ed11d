//! In-memory object store for tests, with failure injection and call counters.

use super::store::{ObjectBody, ObjectStore, StoreError, StoreResult, ensure_key_safe};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::{StreamExt, stream};
use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, (Bytes, String)>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    /// 1-based put call that fails; 0 disables.
    fail_put_number: AtomicUsize,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    put_delay: Option<Duration>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every put sleeps for `delay` before completing.
    pub fn with_put_delay(delay: Duration) -> Self {
        Self {
            put_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Fail only the `n`th put call, counting from 1.
    pub fn fail_nth_put(&self, n: usize) {
        self.fail_put_number.store(n, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.get(key).map(|entry| entry.1.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StoreResult<()> {
        ensure_key_safe(key)?;
        let call = self.put_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_puts.load(Ordering::SeqCst)
            || self.fail_put_number.load(Ordering::SeqCst) == call
        {
            return Err(StoreError::Backend("simulated store outage".into()));
        }
        self.objects
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<ObjectBody>> {
        ensure_key_safe(key)?;
        Ok(self
            .objects
            .get(key)
            .map(|entry| stream::once(futures::future::ready(Ok(entry.0.clone()))).boxed()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        ensure_key_safe(key)?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated delete failure".into()));
        }
        self.objects.remove(key);
        Ok(())
    }

    async fn check(&self) -> StoreResult<()> {
        Ok(())
    }
}
