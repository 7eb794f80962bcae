//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::AppState;
use crate::tools::cache::{CacheGetParams, CacheInstallParams, get_impl, install_impl, keys_impl};
use crate::tools::{SiteFetchParams, fetch_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwCacheServer {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

#[tool_router]
impl SwCacheServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { tool_router: Self::tool_router(), state }
    }

    /// Fetch a site resource through the active cache worker.
    #[tool(
        description = "Fetch a site path or URL through the active cache worker. Reports whether the response came from the network, the cache or the offline fallback page."
    )]
    async fn site_fetch(&self, params: Parameters<SiteFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    /// Install and activate a new cache generation.
    #[tool(
        description = "Pre-cache the core assets into a new versioned bucket, activate it, and evict buckets from other versions."
    )]
    async fn cache_install(&self, params: Parameters<CacheInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.state, params.0).await
    }

    #[tool(description = "Read one cached response from the active bucket without touching the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.state, params.0).await
    }

    #[tool(description = "List cache buckets and the entries held by the active worker.")]
    async fn cache_keys(&self) -> Result<CallToolResult, McpError> {
        keys_impl(&self.state).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{site, state};

    #[test]
    fn test_registers_all_tools() {
        let server = SwCacheServer::new(Arc::new(state(site())));
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["cache_get", "cache_install", "cache_keys", "site_fetch"]);
    }

    #[test]
    fn test_server_info() {
        let server = SwCacheServer::new(Arc::new(state(site())));
        let info = server.get_info();
        assert_eq!(info.server_info.name, "swcache");
        assert!(info.capabilities.tools.is_some());
    }
}
