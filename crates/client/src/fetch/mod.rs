//! HTTP fetch pipeline behind the [`Network`] seam.
//!
//! The worker never talks to reqwest directly: every strategy goes through
//! `Network::fetch`, so tests can script responses and outages.
//!
//! ### Fetch contract
//! - Any HTTP status is a resolved fetch; only transport failures are errors.
//! - `CacheMode::NoStore` requests send `Cache-Control: no-cache` and
//!   `Pragma: no-cache` so intermediate caches are bypassed.
//! - Max body bytes: 5MB (configurable)

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, resolve, same_origin};

use crate::worker::request::{CacheMode, Request, Response};
use swcache_core::{AppConfig, Error};

/// Source of live responses.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. Errors mean no response was produced at all.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "swcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "swcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`Network`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Network(format!("{url}: {err}"))
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = request.url.as_str();

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if request.cache == CacheMode::NoStore {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }

        let response = builder.send().await.map_err(|e| transport_error(url, &e))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();

        let body = response.bytes().await.map_err(|e| transport_error(url, &e))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(Response { url: final_url, status, headers, body })
    }
}
