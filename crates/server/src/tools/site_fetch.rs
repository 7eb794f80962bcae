//! site_fetch tool implementation.
//!
//! Issues a request through the active worker, the way a page under the
//! worker's control would. Requests the worker does not intercept go
//! straight to the network.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{FetchEvent, FetchOutcome, Method, Request, RequestMode, resolve};
use swcache_core::Error;

use crate::state::AppState;

fn default_method() -> String {
    "GET".to_string()
}

/// Parameters for the site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchParams {
    /// Site path (e.g. "/about.html") or absolute URL.
    pub url: String,

    /// Request mode: "navigate", "same-origin" (default), "cors" or "no-cors".
    #[serde(default)]
    pub mode: Option<String>,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,
}

/// Output from the site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// Where the response came from: network, cache, fallback or passthrough.
    pub source: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: usize,
    pub body: String,
}

fn build_request(state: &AppState, params: &SiteFetchParams) -> Result<Request, Error> {
    let url = resolve(&state.origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = params
        .method
        .trim()
        .to_ascii_uppercase()
        .parse::<Method>()
        .map_err(|_| Error::InvalidInput(format!("invalid method: {}", params.method)))?;
    let mode = match params.mode.as_deref() {
        Some(mode) => mode.parse::<RequestMode>()?,
        None => RequestMode::default(),
    };

    let mut request = match mode {
        RequestMode::Navigate => Request::navigate(url),
        mode => Request::new(url, Method::GET, mode),
    };
    request.method = method;
    if let Some(accept) = params.accept.as_deref() {
        request = request.with_accept(accept);
    }
    Ok(request)
}

/// Implementation of the site_fetch tool.
pub async fn fetch_impl(state: &AppState, params: SiteFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(state, &params)?;
    let mut event = FetchEvent::new(request);

    let (response, source) = match state.registration.handle_fetch(&mut event).await? {
        FetchOutcome::Respond { response, source } => (response, source.to_string()),
        FetchOutcome::Passthrough(class) => {
            tracing::debug!(url = %event.request.url, ?class, "passing request through");
            (state.network.fetch(&event.request).await?, "passthrough".to_string())
        }
    };
    // Background cache writes outlive the tool call.
    event.lifetime.detach();

    let output = SiteFetchOutput {
        url: event.request.url.to_string(),
        source,
        status: response.status.as_u16(),
        content_type: response.content_type().map(str::to_string),
        bytes: response.body.len(),
        body: response.text(),
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize response: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
