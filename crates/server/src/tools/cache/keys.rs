//! cache_keys tool implementation.
//!
//! Lists every bucket in the store and the entries of the active one.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::Error;

use crate::state::AppState;

/// The generation currently in control.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActiveWorker {
    pub bucket: String,
    pub state: String,
    pub policy: String,
    pub clients_claimed: bool,
    /// Cached requests, ordered by URL.
    pub entries: Vec<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub buckets: Vec<String>,
    pub active: Option<ActiveWorker>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let buckets = state.store.keys().await?;

    let active = match state.registration.active().await {
        Some(worker) => {
            let entries = state.store.entries(worker.bucket()).await?;
            Some(ActiveWorker {
                bucket: worker.bucket().to_string(),
                state: worker.state().to_string(),
                policy: worker.options().policy.to_string(),
                clients_claimed: worker.clients_claimed(),
                entries: entries.iter().map(ToString::to_string).collect(),
            })
        }
        None => None,
    };

    let output = CacheKeysOutput { buckets, active };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize keys: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
