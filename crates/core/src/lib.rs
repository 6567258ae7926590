//! Core types and shared functionality for workbox.
//!
//! This crate provides:
//! - Precache manifest loading and diffing
//! - Cache storage and installed-record persistence with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod precache;
pub mod response;

pub use cache::{CacheDb, CacheNames, CacheStorage, InstallStore};
pub use config::{AppConfig, ConfigError, InstallPolicy};
pub use error::Error;
pub use precache::{InstalledEntry, ManifestEntry, PrecacheDiff};
pub use response::Response;
