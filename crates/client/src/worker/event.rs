//! Lifetime extension for lifecycle and fetch events.
//!
//! Work that outlives the response (cache writes, background revalidation)
//! is registered with [`ExtendableEvent::wait_until`]. The owner of the event
//! must await [`ExtendableEvent::settled`] (or [`ExtendableEvent::detach`] it
//! onto the runtime) before the worker may be torn down.

use std::future::Future;

use futures_util::future::join_all;
use tokio::task::JoinHandle;

use super::request::Request;

#[derive(Debug, Default)]
pub struct ExtendableEvent {
    pending: Vec<JoinHandle<()>>,
}

impl ExtendableEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the event alive until `task` completes. The task starts immediately.
    pub fn wait_until<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.push(tokio::spawn(task));
    }

    /// Number of registered tasks not yet awaited.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Await every registered task. Returns how many were awaited.
    pub async fn settled(&mut self) -> usize {
        let handles = std::mem::take(&mut self.pending);
        let count = handles.len();
        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "extended task did not complete");
            }
        }
        count
    }

    /// Hand the remaining tasks to the runtime and stop tracking them here.
    pub fn detach(mut self) {
        if self.pending.is_empty() {
            return;
        }
        tokio::spawn(async move {
            let count = self.settled().await;
            tracing::debug!(count, "detached fetch event settled");
        });
    }
}

/// A request intercepted by the worker plus its lifetime handle.
#[derive(Debug)]
pub struct FetchEvent {
    pub request: Request,
    pub lifetime: ExtendableEvent,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self { request, lifetime: ExtendableEvent::new() }
    }

    /// Wait for all background work this event started.
    pub async fn settled(&mut self) -> usize {
        self.lifetime.settled().await
    }
}
