//! The cache controller.
//!
//! A [`Worker`] owns one versioned bucket and moves through the standard
//! lifecycle:
//!
//! ```text
//! Parsed -> Installing -> Installed -> Activating -> Activated
//!                \-> Redundant (install failed, or replaced)
//! ```
//!
//! Only an `Activated` worker intercepts fetches. Every intercepted request
//! is classified once ([`classify`]) and served by exactly one strategy.

pub mod classify;
pub mod event;
pub mod lifecycle;
pub mod registration;
pub mod request;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Url;
use swcache_core::{AppConfig, CacheStore, Error, PolicyKind, RequestKey, StoredResponse};

pub use classify::{RequestClass, classify};
pub use event::{ExtendableEvent, FetchEvent};
pub use lifecycle::{ActivationReport, InstallReport};
pub use registration::{Registration, UpdateReport};
pub use request::{CacheMode, Request, RequestMode, Response};

use crate::fetch::Network;

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn can_intercept_fetch(self) -> bool {
        matches!(self, WorkerState::Activated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Activated => write!(f, "activated"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Where a response handed back to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// The reserved offline page, standing in for the requested resource.
    Fallback,
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseSource::Network => write!(f, "network"),
            ResponseSource::Cache => write!(f, "cache"),
            ResponseSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Result of offering a request to the worker.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the caller performs its default handling. `None`
    /// when the worker is not active.
    Passthrough(Option<RequestClass>),
    Respond { response: Response, source: ResponseSource },
}

/// Everything a worker generation needs to know about its site.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub origin: Url,
    pub policy: PolicyKind,
    /// Bucket owned by this generation, `{prefix}-{version}`.
    pub bucket: String,
    pub core_assets: Vec<String>,
    pub fallback_page: String,
    pub root_page: String,
    pub data_prefix: String,
}

impl WorkerOptions {
    /// Defaults from [`AppConfig::default`] with a different origin.
    pub fn for_origin(origin: Url) -> Self {
        let defaults = AppConfig::default();
        Self {
            origin,
            policy: defaults.policy,
            bucket: defaults.bucket_name(),
            core_assets: defaults.core_assets,
            fallback_page: defaults.fallback_page,
            root_page: defaults.root_page,
            data_prefix: defaults.data_prefix,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        Ok(Self {
            origin,
            policy: config.policy,
            bucket: config.bucket_name(),
            core_assets: config.core_assets.clone(),
            fallback_page: config.fallback_page.clone(),
            root_page: config.root_page.clone(),
            data_prefix: config.data_prefix.clone(),
        })
    }

    /// Absolute URL of a site path.
    pub fn url_for(&self, path: &str) -> Result<Url, Error> {
        crate::fetch::resolve(&self.origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
    }
}

/// One generation of the cache controller.
pub struct Worker {
    id: u64,
    options: WorkerOptions,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    state: Mutex<WorkerState>,
    clients_claimed: AtomicBool,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("bucket", &self.options.bucket)
            .field("policy", &self.options.policy)
            .field("state", &self.state())
            .finish()
    }
}

impl Worker {
    pub fn new(options: WorkerOptions, store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            options,
            store,
            network,
            state: Mutex::new(WorkerState::Parsed),
            clients_claimed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    pub fn bucket(&self) -> &str {
        &self.options.bucket
    }

    pub fn state(&self) -> WorkerState {
        *self.lock_state()
    }

    /// Whether activation took control of already-open clients.
    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::Acquire)
    }

    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(worker = self.id, "recovered from poisoned worker state lock");
                poisoned.into_inner()
            }
        }
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.lock_state();
        if *state != next {
            tracing::info!(worker = self.id, bucket = %self.options.bucket, from = %*state, to = %next, "worker state");
            *state = next;
        }
    }

    /// Move from `expected` to `next`, failing if the worker is elsewhere.
    fn transition(&self, expected: WorkerState, next: WorkerState) -> Result<(), Error> {
        let actual = self.state();
        if actual != expected {
            return Err(Error::InvalidState { expected: expected.to_string(), actual: actual.to_string() });
        }
        self.set_state(next);
        Ok(())
    }

    /// Mark this generation as replaced.
    pub fn retire(&self) {
        self.set_state(WorkerState::Redundant);
    }

    /// Stored response for `key` in this generation's bucket.
    pub async fn lookup(&self, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        self.store.lookup(&self.options.bucket, key).await
    }

    /// Offer an intercepted request to the worker.
    ///
    /// Background work (cache writes, revalidation) is registered on the
    /// event's lifetime; the caller owns waiting for it.
    pub async fn handle_fetch(&self, event: &mut FetchEvent) -> Result<FetchOutcome, Error> {
        let FetchEvent { request, lifetime } = event;

        if !self.state().can_intercept_fetch() {
            return Ok(FetchOutcome::Passthrough(None));
        }

        let class = classify(request, &self.options);
        tracing::debug!(worker = self.id, url = %request.url, ?class, "intercepted fetch");

        match class {
            RequestClass::CrossOrigin | RequestClass::NonGet => Ok(FetchOutcome::Passthrough(Some(class))),
            RequestClass::Navigation => self.network_first(request, lifetime).await,
            RequestClass::Data => self.stale_while_revalidate(request, lifetime).await,
            RequestClass::Static => match self.options.policy {
                PolicyKind::MultiStrategyNavigation => self.cache_first(request, lifetime).await,
                PolicyKind::JsonRevalidate => self.cache_first_root_fallback(request, lifetime).await,
            },
        }
    }
}
