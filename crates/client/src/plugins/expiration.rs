//! Runtime cache expiration by entry count and age.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use workbox_core::{CacheDb, CacheStorage, Error, Response};

use super::{CacheUpdate, Hook, Plugin};
use crate::fetch::Request;

/// Evicts runtime cache entries beyond `max_entries` or older than `max_age`.
///
/// Write times are tracked in the cache database. Eviction runs after
/// every cache write; stale reads are also filtered out on the way back.
#[derive(Debug, Clone)]
pub struct ExpirationPlugin {
    db: CacheDb,
    max_entries: Option<usize>,
    max_age: Option<Duration>,
}

impl ExpirationPlugin {
    /// At least one limit must be set.
    pub fn new(db: CacheDb, max_entries: Option<usize>, max_age: Option<Duration>) -> Result<Self, Error> {
        if max_entries.is_none() && max_age.is_none() {
            return Err(Error::InvalidInput("expiration needs max_entries or max_age".to_string()));
        }
        Ok(Self { db, max_entries, max_age })
    }

    fn max_age_ms(&self) -> Option<i64> {
        self.max_age.map(|age| age.as_millis() as i64)
    }

    /// Evict everything over the limits in `cache_name`. Returns the evicted URLs.
    pub async fn expire_entries(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let now = Utc::now().timestamp_millis();
        let expired = self.db.take_expired(cache_name, now, self.max_age_ms(), self.max_entries).await?;

        for url in &expired {
            if let Err(e) = self.db.delete(cache_name, url).await {
                tracing::warn!(cache = cache_name, url = %url, error = %e, "failed to evict expired entry");
            }
        }

        if !expired.is_empty() {
            tracing::debug!(cache = cache_name, count = expired.len(), "expired runtime entries");
        }
        Ok(expired)
    }

    /// Drop a whole cache together with its timestamps.
    pub async fn delete_cache_and_metadata(&self, cache_name: &str) -> Result<u64, Error> {
        self.db.clear_expiration(cache_name).await?;
        self.db.delete_cache(cache_name).await
    }

    async fn is_fresh(&self, cache_name: &str, url: &str) -> bool {
        let Some(max_age_ms) = self.max_age_ms() else {
            return true;
        };
        match self.db.expiration_timestamp(cache_name, url).await {
            Ok(Some(written)) => Utc::now().timestamp_millis() - written <= max_age_ms,
            // Entries written before the plugin was installed have no timestamp.
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(cache = cache_name, url, error = %e, "failed to read expiration timestamp");
                true
            }
        }
    }
}

#[async_trait]
impl Plugin for ExpirationPlugin {
    fn name(&self) -> &str {
        "expiration"
    }

    fn hooks(&self) -> &'static [Hook] {
        &[Hook::CachedResponseWillBeUsed, Hook::CacheDidUpdate]
    }

    async fn cached_response_will_be_used(
        &self, cache_name: &str, request: &Request, cached: Option<Response>,
    ) -> Option<Response> {
        let cached = cached?;
        if self.is_fresh(cache_name, request.cache_key()).await {
            Some(cached)
        } else {
            tracing::debug!(cache = cache_name, url = %request.url, "ignoring expired cached response");
            if let Err(e) = self.expire_entries(cache_name).await {
                tracing::warn!(cache = cache_name, error = %e, "expiration sweep failed");
            }
            None
        }
    }

    async fn cache_did_update(&self, update: &CacheUpdate<'_>) {
        if let Err(e) = self.db.touch_expiration(update.cache_name, update.cache_key).await {
            tracing::warn!(cache = update.cache_name, error = %e, "failed to record cache write time");
            return;
        }
        if let Err(e) = self.expire_entries(update.cache_name).await {
            tracing::warn!(cache = update.cache_name, error = %e, "expiration sweep failed");
        }
    }
}
