//! cache_install tool implementation.
//!
//! Installs and activates a new worker generation, evicting buckets from
//! other versions.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::Error;

use crate::state::AppState;

/// Parameters for the cache_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallParams {
    /// Version tag for the new generation (default: the configured version).
    #[serde(default)]
    pub version: Option<String>,
}

/// Output from the cache_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallOutput {
    pub bucket: String,
    pub precached: usize,
    pub evicted: Vec<String>,
}

/// Implementation of the cache_install tool.
pub async fn install_impl(state: &AppState, params: CacheInstallParams) -> Result<CallToolResult, McpError> {
    let report = state.install(params.version.as_deref()).await?;

    let output = CacheInstallOutput { bucket: report.bucket, precached: report.precached, evicted: report.evicted };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize report: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
