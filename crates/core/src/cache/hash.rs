//! Request identity used as the cache key.

use sha2::{Digest, Sha256};

/// Identity of a cached request: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    method: String,
    url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &str) -> Self {
        let url = match url.split_once('#') {
            Some((before, _)) => before,
            None => url,
        };
        Self { method: method.to_ascii_uppercase(), url: url.to_string() }
    }

    /// Key for a GET request, the only method the worker caches.
    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// SHA-256 hex digest of the key, used as the storage primary key.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
