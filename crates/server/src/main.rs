//! swcache server entry point.
//!
//! Boots the cache controller behind an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        origin = %config.origin,
        bucket = %config.bucket_name(),
        policy = %config.policy,
        "Starting swcache server on stdio transport"
    );

    let state = Arc::new(state::AppState::open(config).await?);

    // An unreachable origin at boot leaves the server up with no active
    // worker; requests pass through until cache_install succeeds.
    if state.config.install_on_start {
        match state.install(None).await {
            Ok(report) => tracing::info!(bucket = %report.bucket, precached = report.precached, "install complete"),
            Err(e) => tracing::warn!(error = %e, "install on start failed"),
        }
    }

    let handler = handler::SwCacheServer::new(state);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
