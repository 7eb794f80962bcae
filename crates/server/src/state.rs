//! Shared server state: configuration, storage, network, and the registration.

use std::sync::Arc;

use swcache_client::{FetchClient, FetchConfig, Network, Registration, UpdateReport, Worker, WorkerOptions};
use swcache_core::{AppConfig, CacheDb, CacheStore, Error, MemoryStore, StorageKind};
use url::Url;

pub struct AppState {
    pub config: AppConfig,
    pub origin: Url,
    pub store: Arc<dyn CacheStore>,
    pub network: Arc<dyn Network>,
    pub registration: Registration,
}

impl AppState {
    /// Open the configured store and build the HTTP client.
    pub async fn open(config: AppConfig) -> Result<Self, Error> {
        let store: Arc<dyn CacheStore> = match config.storage {
            StorageKind::Sqlite => Arc::new(CacheDb::open(&config.db_path).await?),
            StorageKind::Memory => Arc::new(MemoryStore::new()),
        };
        let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
        Self::with_parts(config, store, network)
    }

    pub fn with_parts(config: AppConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        Ok(Self { config, origin, store, network, registration: Registration::new() })
    }

    /// A fresh worker generation, optionally under a different version tag.
    pub fn new_worker(&self, version: Option<&str>) -> Result<Worker, Error> {
        let mut config = self.config.clone();
        if let Some(version) = version {
            if version.trim().is_empty() {
                return Err(Error::InvalidInput("version cannot be empty".into()));
            }
            config.cache_version = version.trim().to_string();
        }
        let options = WorkerOptions::from_config(&config)?;
        Ok(Worker::new(options, Arc::clone(&self.store), Arc::clone(&self.network)))
    }

    /// Install and activate a new generation.
    pub async fn install(&self, version: Option<&str>) -> Result<UpdateReport, Error> {
        self.registration.update(self.new_worker(version)?).await
    }
}
