//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swcache server.

pub mod cache;
pub mod site_fetch;

pub use site_fetch::{SiteFetchParams, fetch_impl};
