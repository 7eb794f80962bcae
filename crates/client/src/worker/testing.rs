//! Scripted collaborators for worker tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use swcache_core::{CacheStore, Error, MemoryStore, PolicyKind, RequestKey, StoredResponse};
use tokio::sync::watch;

use super::request::{CacheMode, Request, Response};
use super::{Worker, WorkerOptions};
use crate::fetch::Network;

pub(crate) const ORIGIN: &str = "https://site.example";

pub(crate) fn site_url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".json") {
        "application/json"
    } else if path.ends_with(".css") {
        "text/css"
    } else if path.ends_with(".js") {
        "text/javascript"
    } else {
        "text/html"
    }
}

#[derive(Clone)]
struct Route {
    status: StatusCode,
    body: String,
}

/// In-memory site with an offline switch and a gate that holds fetches.
pub(crate) struct StubNetwork {
    routes: Mutex<HashMap<String, Route>>,
    offline: AtomicBool,
    refused: Mutex<Vec<String>>,
    gate: watch::Sender<bool>,
    calls: Mutex<Vec<(String, CacheMode)>>,
}

impl StubNetwork {
    pub(crate) fn site(pages: &[(&str, &str)]) -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        let network = Self {
            routes: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            refused: Mutex::new(Vec::new()),
            gate,
            calls: Mutex::new(Vec::new()),
        };
        for (path, body) in pages {
            network.route(path, StatusCode::OK, body);
        }
        Arc::new(network)
    }

    /// Serve `body` with `status` for `path` (path plus optional query).
    pub(crate) fn route(&self, path: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Route { status, body: body.to_string() });
    }

    /// Fail fetches of `path` with a non-network error.
    pub(crate) fn refuse(&self, path: &str) {
        self.refused.lock().unwrap().push(path.to_string());
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Park every fetch until [`StubNetwork::release`].
    pub(crate) fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub(crate) fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Number of fetches that reached the network, held ones included.
    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls(&self) -> Vec<(String, CacheMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((request.url.to_string(), request.cache));

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }

        let path = match request.url.query() {
            Some(query) => format!("{}?{query}", request.url.path()),
            None => request.url.path().to_string(),
        };
        if self.refused.lock().unwrap().contains(&path) {
            return Err(Error::InvalidUrl(format!("{}: refused", request.url)));
        }
        let route = self.routes.lock().unwrap().get(&path).cloned();
        let Route { status, body } = route.unwrap_or(Route { status: StatusCode::NOT_FOUND, body: "not found".into() });

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type_for(&path)));

        Ok(Response { url: request.url.to_string(), status, headers, body: Bytes::from(body) })
    }
}

/// A store whose writes can be switched to fail, as with an exhausted quota.
///
/// With `fail_deletes` set, a delete removes the bucket and then reports an
/// error, leaving eviction half done.
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::CorruptEntry("quota exceeded".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn open(&self, bucket: &str) -> Result<(), Error> {
        self.inner.open(bucket).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn delete(&self, bucket: &str) -> Result<bool, Error> {
        let deleted = self.inner.delete(bucket).await?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::CorruptEntry(format!("{bucket}: delete interrupted")));
        }
        Ok(deleted)
    }

    async fn lookup(&self, bucket: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        self.inner.lookup(bucket, key).await
    }

    async fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<bool, Error> {
        self.check_writable()?;
        self.inner.put(bucket, key, response).await
    }

    async fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        self.check_writable()?;
        self.inner.put_all(bucket, entries).await
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, Error> {
        self.inner.entries(bucket).await
    }
}

pub(crate) fn options(core: &[&str], policy: PolicyKind) -> WorkerOptions {
    WorkerOptions {
        policy,
        bucket: "static-v1".into(),
        core_assets: core.iter().map(|p| p.to_string()).collect(),
        ..WorkerOptions::for_origin(Url::parse(ORIGIN).unwrap())
    }
}

pub(crate) fn worker_with(
    core: &[&str], policy: PolicyKind, store: Arc<dyn CacheStore>, network: Arc<StubNetwork>,
) -> Worker {
    Worker::new(options(core, policy), store, network)
}

/// Installed and activated worker over the given store and network.
pub(crate) async fn active_worker(
    core: &[&str], policy: PolicyKind, store: Arc<dyn CacheStore>, network: Arc<StubNetwork>,
) -> Worker {
    let worker = worker_with(core, policy, store, network);
    worker.install().await.unwrap();
    worker.activate().await.unwrap();
    worker
}
