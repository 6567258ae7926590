//! Storage collaborator interfaces.
//!
//! The precache and strategy code is written against these traits rather
//! than against SQLite so tests and embedders can supply their own stores.

use async_trait::async_trait;

use crate::Error;
use crate::Response;
use crate::precache::InstalledEntry;

/// Named key to response store.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Store `response` under `key`, replacing any previous entry.
    async fn put(&self, cache_name: &str, key: &str, response: &Response) -> Result<(), Error>;

    /// Look up the response stored under `key`.
    async fn lookup(&self, cache_name: &str, key: &str) -> Result<Option<Response>, Error>;

    /// Remove the entry under `key`. Returns whether an entry existed.
    async fn delete(&self, cache_name: &str, key: &str) -> Result<bool, Error>;

    /// All keys stored in a cache, sorted.
    async fn keys(&self, cache_name: &str) -> Result<Vec<String>, Error>;

    /// Names of every cache holding at least one entry, sorted.
    async fn cache_names(&self) -> Result<Vec<String>, Error>;

    /// Drop a whole cache. Returns the number of entries removed.
    async fn delete_cache(&self, cache_name: &str) -> Result<u64, Error>;
}

/// Durable record of which precache entries are installed.
#[async_trait]
pub trait InstallStore: Send + Sync {
    /// Installed entries for a precache, sorted by URL. Empty on first run.
    async fn load_installed(&self, cache_name: &str) -> Result<Vec<InstalledEntry>, Error>;

    /// Replace the installed record for a precache in one step.
    async fn save_installed(&self, cache_name: &str, entries: &[InstalledEntry]) -> Result<(), Error>;
}
