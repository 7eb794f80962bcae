//! Install and activate phases.

use futures_util::future::try_join_all;
use std::sync::atomic::Ordering;

use swcache_core::Error;

use super::request::Request;
use super::{Worker, WorkerState};

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub bucket: String,
    pub precached: usize,
}

/// Outcome of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub bucket: String,
    /// Buckets from earlier generations that were deleted.
    pub evicted: Vec<String>,
}

impl Worker {
    /// Pre-cache every core asset into this generation's bucket.
    ///
    /// All-or-nothing: one failed or non-2xx fetch fails the install, nothing
    /// is written, and the worker becomes redundant. A successful install
    /// asks for immediate activation; [`Registration`](super::Registration)
    /// honours that by activating right away.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)?;

        match self.precache().await {
            Ok(precached) => {
                self.set_state(WorkerState::Installed);
                Ok(InstallReport { bucket: self.options.bucket.clone(), precached })
            }
            Err(e) => {
                tracing::warn!(worker = self.id, bucket = %self.options.bucket, error = %e, "install failed");
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        let requests = self
            .options
            .core_assets
            .iter()
            .map(|path| Ok((path.as_str(), Request::get(self.options.url_for(path)?))))
            .collect::<Result<Vec<_>, Error>>()?;

        let fetches = requests.iter().map(|(path, request)| async move {
            let response = self
                .network
                .fetch(request)
                .await
                .map_err(|e| Error::InstallFailed { url: path.to_string(), reason: e.to_string() })?;

            if !response.is_success() {
                return Err(Error::InstallFailed {
                    url: path.to_string(),
                    reason: format!("status {}", response.status.as_u16()),
                });
            }

            Ok((request.key(), response.to_stored()))
        });

        let entries = try_join_all(fetches).await?;
        self.store.put_all(&self.options.bucket, &entries).await?;

        tracing::info!(worker = self.id, bucket = %self.options.bucket, count = entries.len(), "core assets cached");
        Ok(entries.len())
    }

    /// Delete every bucket but this generation's, then claim open clients.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition(WorkerState::Installed, WorkerState::Activating)?;

        match self.evict_stale_buckets().await {
            Ok(evicted) => {
                self.clients_claimed.store(true, Ordering::Release);
                self.set_state(WorkerState::Activated);
                Ok(ActivationReport { bucket: self.options.bucket.clone(), evicted })
            }
            Err(e) => {
                tracing::warn!(worker = self.id, error = %e, "activation failed");
                self.set_state(WorkerState::Installed);
                Err(e)
            }
        }
    }

    async fn evict_stale_buckets(&self) -> Result<Vec<String>, Error> {
        let mut evicted = Vec::new();
        for name in self.store.keys().await? {
            if name == self.options.bucket {
                continue;
            }
            if self.store.delete(&name).await? {
                tracing::info!(worker = self.id, bucket = %name, "evicted stale bucket");
                evicted.push(name);
            }
        }
        Ok(evicted)
    }
}
