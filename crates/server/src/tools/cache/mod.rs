//! Cache-related MCP tools.
//!
//! This module provides tools for reading and pruning the precache and
//! runtime caches.

pub mod get;
pub mod purge;

pub use get::{CacheMatchParams, match_impl};
pub use purge::{CachePurgeParams, purge_impl};
