//! In-process [`CacheStore`] backend.
//!
//! Holds buckets in a `Vec` so `keys()` reports creation order, each bucket
//! mapping request keys to responses. Nothing survives the process.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::hash::RequestKey;
use super::store::{CacheStore, StoredResponse};
use crate::Error;

#[derive(Debug, Default)]
struct Bucket {
    name: String,
    entries: BTreeMap<RequestKey, StoredResponse>,
}

/// In-memory cache storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buckets: Arc<RwLock<Vec<Bucket>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn bucket_mut<'a>(buckets: &'a mut Vec<Bucket>, name: &str) -> &'a mut Bucket {
    let idx = match buckets.iter().position(|b| b.name == name) {
        Some(idx) => idx,
        None => {
            buckets.push(Bucket { name: name.to_string(), entries: BTreeMap::new() });
            buckets.len() - 1
        }
    };
    &mut buckets[idx]
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, bucket: &str) -> Result<(), Error> {
        let mut buckets = self.buckets.write().await;
        bucket_mut(&mut buckets, bucket);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.buckets.read().await.iter().map(|b| b.name.clone()).collect())
    }

    async fn delete(&self, bucket: &str) -> Result<bool, Error> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|b| b.name != bucket);
        Ok(buckets.len() != before)
    }

    async fn lookup(&self, bucket: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .iter()
            .find(|b| b.name == bucket)
            .and_then(|b| b.entries.get(key))
            .cloned())
    }

    async fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<bool, Error> {
        let mut buckets = self.buckets.write().await;
        match buckets.iter_mut().find(|b| b.name == bucket) {
            Some(target) => {
                target.entries.insert(key.clone(), response.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        let mut buckets = self.buckets.write().await;
        let target = bucket_mut(&mut buckets, bucket);
        for (key, response) in entries {
            target.entries.insert(key.clone(), response.clone());
        }
        Ok(())
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, Error> {
        let buckets = self.buckets.read().await;
        let mut keys: Vec<RequestKey> = buckets
            .iter()
            .find(|b| b.name == bucket)
            .map(|b| b.entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort_by(|a, b| a.url().cmp(b.url()));
        Ok(keys)
    }
}
