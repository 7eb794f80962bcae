//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Which caching policy the worker applies to intercepted requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Network-first navigations with an error-page fallback, cache-first for
    /// every other same-origin GET.
    #[default]
    MultiStrategyNavigation,
    /// Stale-while-revalidate under the data prefix, cache-first with a root
    /// page fallback for everything else.
    JsonRevalidate,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::MultiStrategyNavigation => write!(f, "multi-strategy-navigation"),
            PolicyKind::JsonRevalidate => write!(f, "json-revalidate"),
        }
    }
}

/// Backend used for cache buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Sqlite,
    Memory,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin of the site being cached. Requests to any other origin pass through.
    ///
    /// Set via SWCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix of the bucket name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag. Bumping it evicts every older bucket on the next activation.
    ///
    /// Set via SWCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Caching policy.
    #[serde(default)]
    pub policy: PolicyKind,

    /// Paths pre-cached on install. All of them must be fetchable.
    #[serde(default = "default_core_assets")]
    pub core_assets: Vec<String>,

    /// Error page served when an HTML request fails with no cached copy.
    #[serde(default = "default_fallback_page")]
    pub fallback_page: String,

    /// Root page, the offline fallback of the JSON-aware policy.
    #[serde(default = "default_root_page")]
    pub root_page: String,

    /// Paths under this prefix are revalidated on read.
    #[serde(default = "default_data_prefix")]
    pub data_prefix: String,

    /// Cache storage backend.
    ///
    /// Set via SWCACHE_STORAGE environment variable (`sqlite` or `memory`).
    #[serde(default)]
    pub storage: StorageKind,

    /// Path to SQLite cache database.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Install and activate the worker when the server boots.
    #[serde(default = "default_true")]
    pub install_on_start: bool,
}

fn default_origin() -> String {
    "http://127.0.0.1:8000".into()
}

fn default_cache_prefix() -> String {
    "static".into()
}

fn default_cache_version() -> String {
    "v3".into()
}

fn default_core_assets() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/projects.html",
        "/project.html",
        "/404.html",
        "/500.html",
        "/assets/site.css",
        "/assets/common.js",
        "/assets/index.js",
        "/assets/projects.js",
        "/assets/project.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_fallback_page() -> String {
    "/500.html".into()
}

fn default_root_page() -> String {
    "/".into()
}

fn default_data_prefix() -> String {
    "/data/".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            policy: PolicyKind::default(),
            core_assets: default_core_assets(),
            fallback_page: default_fallback_page(),
            root_page: default_root_page(),
            data_prefix: default_data_prefix(),
            storage: StorageKind::default(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            install_on_start: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the bucket owned by the configured version.
    pub fn bucket_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.cache_version)
    }

    /// Page served when both cache and network fail, per policy.
    pub fn offline_page(&self) -> &str {
        match self.policy {
            PolicyKind::MultiStrategyNavigation => &self.fallback_page,
            PolicyKind::JsonRevalidate => &self.root_page,
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
