//! The slot holding the worker generation currently in control.

use std::sync::Arc;

use swcache_core::Error;
use tokio::sync::{Mutex, RwLock};

use super::event::FetchEvent;
use super::{FetchOutcome, Worker};

/// Summary of a successful generation swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub bucket: String,
    pub precached: usize,
    pub evicted: Vec<String>,
}

/// Holds the active worker and swaps in new generations.
#[derive(Debug, Default)]
pub struct Registration {
    active: RwLock<Option<Arc<Worker>>>,
    /// One update at a time, held from install through the swap.
    updating: Mutex<()>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn active(&self) -> Option<Arc<Worker>> {
        self.active.read().await.clone()
    }

    /// Install and activate `worker`, then make it the active generation.
    ///
    /// Updates are serialized. If install fails the previous generation stays
    /// in control and its bucket is untouched. If activation fails after
    /// evicting the previous generation's bucket, that generation is retired
    /// too and requests pass through until the next successful update.
    pub async fn update(&self, worker: Worker) -> Result<UpdateReport, Error> {
        let _updating = self.updating.lock().await;

        let install = worker.install().await?;
        let activation = match worker.activate().await {
            Ok(activation) => activation,
            Err(e) => {
                self.retire_if_evicted(&worker).await;
                return Err(e);
            }
        };

        let worker = Arc::new(worker);
        let previous = self.active.write().await.replace(Arc::clone(&worker));
        if let Some(previous) = previous {
            previous.retire();
        }

        tracing::info!(
            worker = worker.id(),
            bucket = %activation.bucket,
            precached = install.precached,
            evicted = activation.evicted.len(),
            "worker generation active"
        );

        Ok(UpdateReport { bucket: activation.bucket, precached: install.precached, evicted: activation.evicted })
    }

    async fn retire_if_evicted(&self, failed: &Worker) {
        let mut active = self.active.write().await;
        let Some(current) = active.as_ref() else {
            return;
        };
        let names = match failed.store.keys().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list buckets after failed activation");
                return;
            }
        };
        if !names.iter().any(|name| name == current.bucket()) {
            tracing::warn!(worker = current.id(), bucket = %current.bucket(), "active bucket evicted, retiring worker");
            if let Some(previous) = active.take() {
                previous.retire();
            }
        }
    }

    /// Route a fetch through the active worker, if any.
    pub async fn handle_fetch(&self, event: &mut FetchEvent) -> Result<FetchOutcome, Error> {
        match self.active().await {
            Some(worker) => worker.handle_fetch(event).await,
            None => Ok(FetchOutcome::Passthrough(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{FlakyStore, StubNetwork, options, site_url};
    use super::super::*;
    use reqwest::StatusCode;
    use swcache_core::{CacheDb, CacheStore, MemoryStore};

    const CORE: &[&str] = &["/", "/500.html"];

    fn generation_with(
        version: &str, core: &[&str], policy: PolicyKind, store: Arc<dyn CacheStore>, network: &Arc<StubNetwork>,
    ) -> Worker {
        let opts = WorkerOptions { bucket: format!("static-{version}"), ..options(core, policy) };
        Worker::new(opts, store, network.clone())
    }

    fn generation<S: CacheStore + 'static>(version: &str, store: &Arc<S>, network: &Arc<StubNetwork>) -> Worker {
        generation_with(version, CORE, PolicyKind::MultiStrategyNavigation, store.clone(), network)
    }

    /// A revalidation started by v1 finishes after v2 has taken over.
    async fn late_revalidation_leaves_one_bucket(store: Arc<dyn CacheStore>) {
        const DATA: &[&str] = &["/", "/data/p.json"];
        let old_site = StubNetwork::site(&[("/", "home"), ("/data/p.json", r#"{"v":1}"#)]);
        let new_site = StubNetwork::site(&[("/", "home"), ("/data/p.json", r#"{"v":2}"#)]);
        let registration = Registration::new();

        let v1 = generation_with("v1", DATA, PolicyKind::JsonRevalidate, store.clone(), &old_site);
        registration.update(v1).await.unwrap();

        old_site.hold();
        let mut event = FetchEvent::new(Request::get(site_url("/data/p.json")));
        let outcome = registration.handle_fetch(&mut event).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Respond { source: ResponseSource::Cache, .. }));
        assert_eq!(event.lifetime.pending(), 1);

        let v2 = generation_with("v2", DATA, PolicyKind::JsonRevalidate, store.clone(), &new_site);
        registration.update(v2).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["static-v2".to_string()]);

        old_site.release();
        event.settled().await;
        assert_eq!(store.keys().await.unwrap(), vec!["static-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_late_revalidation_does_not_resurrect_bucket_in_memory() {
        late_revalidation_leaves_one_bucket(Arc::new(MemoryStore::new())).await;
    }

    #[tokio::test]
    async fn test_late_revalidation_does_not_resurrect_bucket_in_sqlite() {
        late_revalidation_leaves_one_bucket(Arc::new(CacheDb::open_in_memory().await.unwrap())).await;
    }

    #[tokio::test]
    async fn test_empty_registration_passes_through() {
        let registration = Registration::new();
        let mut event = FetchEvent::new(Request::navigate(site_url("/")));
        let outcome = registration.handle_fetch(&mut event).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough(None)));
    }

    #[tokio::test]
    async fn test_version_bump_replaces_generation() {
        let network = StubNetwork::site(&[("/", "home v1"), ("/500.html", "error page")]);
        let store = Arc::new(MemoryStore::new());
        let registration = Registration::new();

        registration.update(generation("v1", &store, &network)).await.unwrap();
        let first = registration.active().await.unwrap();

        network.route("/", StatusCode::OK, "home v2");
        let report = registration.update(generation("v2", &store, &network)).await.unwrap();

        assert_eq!(report.bucket, "static-v2");
        assert_eq!(report.precached, 2);
        assert_eq!(report.evicted, vec!["static-v1".to_string()]);
        assert_eq!(store.keys().await.unwrap(), vec!["static-v2".to_string()]);
        assert_eq!(first.state(), WorkerState::Redundant);

        network.set_offline(true);
        let mut event = FetchEvent::new(Request::navigate(site_url("/")));
        match registration.handle_fetch(&mut event).await.unwrap() {
            FetchOutcome::Respond { response, source } => {
                assert_eq!(source, ResponseSource::Cache);
                assert_eq!(response.text(), "home v2");
            }
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_generation() {
        let network = StubNetwork::site(&[("/", "home"), ("/500.html", "error page")]);
        let store = Arc::new(MemoryStore::new());
        let registration = Registration::new();
        registration.update(generation("v1", &store, &network)).await.unwrap();

        network.set_offline(true);
        let err = registration.update(generation("v2", &store, &network)).await.unwrap_err();
        assert!(matches!(err, Error::InstallFailed { .. }));

        let active = registration.active().await.unwrap();
        assert_eq!(active.bucket(), "static-v1");
        assert_eq!(active.state(), WorkerState::Activated);
        assert_eq!(store.keys().await.unwrap(), vec!["static-v1".to_string()]);

        let mut event = FetchEvent::new(Request::navigate(site_url("/")));
        let outcome = registration.handle_fetch(&mut event).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Respond { source: ResponseSource::Cache, .. }));
    }

    #[tokio::test]
    async fn test_concurrent_updates_leave_only_active_bucket() {
        let network = StubNetwork::site(&[("/", "home"), ("/500.html", "error page")]);
        let store = Arc::new(MemoryStore::new());
        let registration = Registration::new();
        registration.update(generation("v1", &store, &network)).await.unwrap();

        let (v2, v3) = tokio::join!(
            registration.update(generation("v2", &store, &network)),
            registration.update(generation("v3", &store, &network)),
        );
        v2.unwrap();
        v3.unwrap();

        let active = registration.active().await.unwrap();
        assert_eq!(active.state(), WorkerState::Activated);
        assert_eq!(store.keys().await.unwrap(), vec![active.bucket().to_string()]);
    }

    #[tokio::test]
    async fn test_failed_activation_retires_evicted_generation() {
        let network = StubNetwork::site(&[("/", "home"), ("/500.html", "error page")]);
        let store = Arc::new(FlakyStore::default());
        let registration = Registration::new();
        registration.update(generation("v1", &store, &network)).await.unwrap();
        let first = registration.active().await.unwrap();

        store.fail_deletes(true);
        assert!(registration.update(generation("v2", &store, &network)).await.is_err());

        assert!(registration.active().await.is_none());
        assert_eq!(first.state(), WorkerState::Redundant);
        assert_eq!(store.keys().await.unwrap(), vec!["static-v2".to_string()]);

        let mut event = FetchEvent::new(Request::navigate(site_url("/")));
        let outcome = registration.handle_fetch(&mut event).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough(None)));
    }
}
