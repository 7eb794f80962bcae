//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Versioned cache storage with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStore, MemoryStore, RequestKey, StoredResponse};
pub use config::{AppConfig, ConfigError, PolicyKind, StorageKind};
pub use error::Error;
