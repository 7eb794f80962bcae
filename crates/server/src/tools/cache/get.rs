//! cache_get tool implementation.
//!
//! Reads one entry from the active worker's bucket without touching the network.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::resolve;
use swcache_core::{Error, RequestKey};

use crate::state::AppState;

fn default_method() -> String {
    "GET".to_string()
}

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Site path or absolute URL of the cached request.
    pub url: String,

    /// HTTP method of the cached request (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub bucket: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub stored_at: String,
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(state: &AppState, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let worker = state
        .registration
        .active()
        .await
        .ok_or_else(|| Error::InvalidState { expected: "activated".into(), actual: "no active worker".into() })?;

    let url = resolve(&state.origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let key = RequestKey::new(&params.method, url.as_str());
    let entry = worker.lookup(&key).await?.ok_or_else(|| Error::CacheMiss(key.to_string()))?;

    let output = CacheGetOutput {
        bucket: worker.bucket().to_string(),
        url: entry.url.clone(),
        status: entry.status,
        content_type: entry.content_type().map(str::to_string),
        stored_at: entry.stored_at.clone(),
        body: String::from_utf8_lossy(&entry.body).into_owned(),
        headers: entry.headers,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
