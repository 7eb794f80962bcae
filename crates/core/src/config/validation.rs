//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL
    /// - `cache_prefix` or `cache_version` is empty
    /// - `core_assets` is empty or holds a path without a leading `/`
    /// - the policy's offline page is missing from `core_assets`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            Ok(origin) => return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme()))),
            Err(e) => return Err(invalid("origin", e.to_string())),
        }

        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.cache_version.is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }

        if self.core_assets.is_empty() {
            return Err(invalid("core_assets", "must list at least one path"));
        }
        if let Some(path) = self.core_assets.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid("core_assets", format!("path must start with '/': {path}")));
        }

        for (field, path) in
            [("fallback_page", &self.fallback_page), ("root_page", &self.root_page), ("data_prefix", &self.data_prefix)]
        {
            if !path.starts_with('/') {
                return Err(invalid(field, "must start with '/'"));
            }
        }

        let offline_page = self.offline_page();
        if !self.core_assets.iter().any(|p| p == offline_page) {
            return Err(invalid("core_assets", format!("must include the offline page {offline_page}")));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.core_assets.iter().any(|p| p.starts_with(&self.data_prefix)) {
            tracing::warn!(
                data_prefix = %self.data_prefix,
                "core_assets include data paths; they are pre-cached and then revalidated on read"
            );
        }

        Ok(())
    }
}
