//! Versioned cache buckets of request-keyed response snapshots.
//!
//! The [`CacheStore`] trait is the only shared mutable state the worker
//! touches. Two backends implement it:
//!
//! - [`CacheDb`]: SQLite via tokio-rusqlite, WAL mode, automatic migrations
//! - [`MemoryStore`]: in-process maps, for ephemeral runs and tests
//!
//! Writes are last-write-wins with no merge; entries never expire on their
//! own and are only evicted by deleting the whole bucket.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::RequestKey;
pub use memory::MemoryStore;
pub use store::{CacheStore, StoredResponse};
