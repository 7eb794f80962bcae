//! Storage abstraction for cache buckets.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::hash::RequestKey;
use crate::Error;

/// A stored response snapshot.
///
/// `stored_at` is informational; nothing expires by age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoredResponse {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Named, versioned buckets of request-keyed responses.
///
/// Implementations must give `put` wholesale-replace semantics (last write
/// wins) and make `put_all` atomic. Only `open` and `put_all` create buckets;
/// a `put` into a missing bucket writes nothing, so a late write from a
/// superseded generation cannot resurrect an evicted bucket.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the bucket if missing.
    async fn open(&self, bucket: &str) -> Result<(), Error>;

    /// Bucket names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a bucket with all its entries. Returns false if it did not exist.
    async fn delete(&self, bucket: &str) -> Result<bool, Error>;

    async fn lookup(&self, bucket: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error>;

    /// Store one entry. Returns false, without writing, if the bucket is gone.
    async fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<bool, Error>;

    /// Create the bucket if missing and store every entry or none of them.
    async fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error>;

    /// Keys of the entries stored in a bucket, ordered by URL.
    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, Error>;
}
