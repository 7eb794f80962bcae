//! Cache-related MCP tools.
//!
//! These inspect and drive the versioned cache owned by the active worker.

pub mod get;
pub mod install;
pub mod keys;

pub use get::{CacheGetParams, get_impl};
pub use install::{CacheInstallParams, install_impl};
pub use keys::keys_impl;
