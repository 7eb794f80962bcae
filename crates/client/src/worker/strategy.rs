//! Fetch strategies.
//!
//! Cache reads that fail are treated as misses and cache writes run in the
//! background on the event's lifetime; neither ever fails a response. Only
//! network failures (see [`Error::is_network`]) trigger the cached or
//! fallback answers; any other fetch error reaches the caller.

use std::sync::Arc;

use swcache_core::{CacheStore, Error, RequestKey, StoredResponse};

use super::event::ExtendableEvent;
use super::request::{Request, Response};
use super::{FetchOutcome, ResponseSource, Worker};

fn respond(response: Response, source: ResponseSource) -> Result<FetchOutcome, Error> {
    Ok(FetchOutcome::Respond { response, source })
}

/// Best-effort write. A bucket evicted since the fetch began stays evicted.
async fn write_entry(store: &dyn CacheStore, bucket: &str, key: &RequestKey, stored: &StoredResponse) {
    match store.put(bucket, key, stored).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(%key, bucket, "bucket evicted, dropping cache write"),
        Err(e) => tracing::warn!(%key, error = %e, "cache write failed"),
    }
}

impl Worker {
    /// Cached response for `key`, or `None` on a miss or unreadable entry.
    async fn cached(&self, key: &RequestKey) -> Option<Response> {
        let stored = match self.store.lookup(&self.options.bucket, key).await {
            Ok(stored) => stored?,
            Err(e) => {
                tracing::warn!(worker = self.id, %key, error = %e, "cache read failed");
                return None;
            }
        };
        match Response::try_from(stored) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(worker = self.id, %key, error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    /// Cached copy of a site page such as the fallback or root page.
    async fn cached_page(&self, path: &str) -> Option<Response> {
        let url = self.options.url_for(path).ok()?;
        self.cached(&RequestKey::get(url.as_str())).await
    }

    /// Write a clone of `response` under `key` once the event allows it.
    fn store_in_background(&self, lifetime: &mut ExtendableEvent, key: RequestKey, response: &Response) {
        if !response.is_cacheable() {
            tracing::debug!(worker = self.id, %key, status = response.status.as_u16(), "response not cacheable");
            return;
        }
        let store = Arc::clone(&self.store);
        let bucket = self.options.bucket.clone();
        let stored = response.to_stored();
        lifetime.wait_until(async move { write_entry(store.as_ref(), &bucket, &key, &stored).await });
    }

    /// Network-first, used for navigations.
    ///
    /// Live response on success (stored for later). On failure the cached
    /// copy of this exact request, then the fallback page.
    pub(crate) async fn network_first(
        &self, request: &Request, lifetime: &mut ExtendableEvent,
    ) -> Result<FetchOutcome, Error> {
        let key = request.key();
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_in_background(lifetime, key, &response);
                respond(response, ResponseSource::Network)
            }
            Err(err) if err.is_network() => {
                tracing::debug!(worker = self.id, %key, error = %err, "navigation failed, trying cache");
                if let Some(cached) = self.cached(&key).await {
                    return respond(cached, ResponseSource::Cache);
                }
                match self.cached_page(&self.options.fallback_page).await {
                    Some(fallback) => respond(fallback, ResponseSource::Fallback),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Stale-while-revalidate, used for data paths.
    ///
    /// A cached copy is returned before the network answers; the refresh runs
    /// on the event's lifetime and only 2xx responses replace the entry.
    pub(crate) async fn stale_while_revalidate(
        &self, request: &Request, lifetime: &mut ExtendableEvent,
    ) -> Result<FetchOutcome, Error> {
        let key = request.key();
        let refresh = request.no_store();

        if let Some(cached) = self.cached(&key).await {
            tracing::debug!(worker = self.id, %key, "serving stale, revalidating");
            let network = Arc::clone(&self.network);
            let store = Arc::clone(&self.store);
            let bucket = self.options.bucket.clone();
            lifetime.wait_until(async move {
                match network.fetch(&refresh).await {
                    Ok(response) if response.is_success() && response.is_cacheable() => {
                        write_entry(store.as_ref(), &bucket, &key, &response.to_stored()).await;
                    }
                    Ok(response) => {
                        tracing::debug!(%key, status = response.status.as_u16(), "revalidation kept stale entry");
                    }
                    Err(e) => tracing::debug!(%key, error = %e, "revalidation failed"),
                }
            });
            return respond(cached, ResponseSource::Cache);
        }

        let response = self.network.fetch(&refresh).await?;
        if response.is_success() {
            self.store_in_background(lifetime, key, &response);
        }
        respond(response, ResponseSource::Network)
    }

    /// Cache-first with the error page for failed HTML requests.
    ///
    /// A failed non-HTML request propagates its error to the caller.
    pub(crate) async fn cache_first(
        &self, request: &Request, lifetime: &mut ExtendableEvent,
    ) -> Result<FetchOutcome, Error> {
        let key = request.key();
        if let Some(cached) = self.cached(&key).await {
            tracing::debug!(worker = self.id, %key, "cache hit");
            return respond(cached, ResponseSource::Cache);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_in_background(lifetime, key, &response);
                respond(response, ResponseSource::Network)
            }
            Err(err) if err.is_network() && request.accepts_html() => {
                match self.cached_page(&self.options.fallback_page).await {
                    Some(fallback) => respond(fallback, ResponseSource::Fallback),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Whether `key` names the root page exactly, query string included.
    fn is_root_page(&self, key: &RequestKey) -> bool {
        self.options
            .url_for(&self.options.root_page)
            .is_ok_and(|root| *key == RequestKey::get(root.as_str()))
    }

    /// Cache-first that only stores the root page and falls back to it.
    pub(crate) async fn cache_first_root_fallback(
        &self, request: &Request, lifetime: &mut ExtendableEvent,
    ) -> Result<FetchOutcome, Error> {
        let key = request.key();
        if let Some(cached) = self.cached(&key).await {
            tracing::debug!(worker = self.id, %key, "cache hit");
            return respond(cached, ResponseSource::Cache);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() && self.is_root_page(&key) {
                    self.store_in_background(lifetime, key, &response);
                }
                respond(response, ResponseSource::Network)
            }
            Err(err) if err.is_network() => match self.cached_page(&self.options.root_page).await {
                Some(root) => respond(root, ResponseSource::Fallback),
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }
}
