//! SQLite-backed cache storage and precache bookkeeping.
//!
//! This module provides the storage collaborators used by the precache and
//! runtime caching code, using SQLite with async access via tokio-rusqlite:
//!
//! - Named caches of responses keyed by cache key
//! - The installed precache record, replaced atomically per install
//! - Expiration timestamps for runtime caches
//! - Automatic schema migrations, WAL mode

pub mod connection;
pub mod entries;
pub mod expiration;
pub mod hash;
pub mod installed;
pub mod migrations;
pub mod names;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use names::CacheNames;
pub use storage::{CacheStorage, InstallStore};
