//! Caching strategies.
//!
//! Every strategy shares the same building blocks, collected on
//! [`StrategyOptions`]: a plugin-wrapped network fetch, a plugin-filtered
//! cache read and a cacheability-checked cache write. The strategies differ
//! only in how they order and combine those three.

mod cache_first;
mod cache_only;
mod network_first;
mod network_only;
mod stale_while_revalidate;

use std::sync::Arc;

use async_trait::async_trait;
use workbox_core::{CacheStorage, Error, Response};

use crate::fetch::{Fetcher, Request};
use crate::lifetime::Lifetime;
use crate::plugins::{CacheUpdate, Hook, Plugins};

pub use cache_first::CacheFirst;
pub use cache_only::CacheOnly;
pub use network_first::NetworkFirst;
pub use network_only::NetworkOnly;
pub use stale_while_revalidate::StaleWhileRevalidate;

/// A request handler: turns a request into a response.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Produce a response for `request`.
    ///
    /// Work that outlives the response (background cache updates) is
    /// registered on `lifetime`.
    async fn handle(&self, request: &Request, lifetime: &Lifetime) -> Result<Response, Error>;
}

impl std::fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which responses a strategy stores when no plugin decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cacheability {
    /// Status 200 only.
    Ok,
    /// Status 200, or an opaque response.
    OkOrOpaque,
}

impl Cacheability {
    pub fn accepts(self, response: &Response) -> bool {
        match self {
            Cacheability::Ok => response.status == 200,
            Cacheability::OkOrOpaque => response.status == 200 || response.is_opaque(),
        }
    }
}

/// Collaborators and settings shared by the strategies.
#[derive(Clone)]
pub struct StrategyOptions {
    pub cache_name: String,
    pub storage: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
    pub plugins: Plugins,
}

impl std::fmt::Debug for StrategyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyOptions")
            .field("cache_name", &self.cache_name)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl StrategyOptions {
    pub fn new(cache_name: impl Into<String>, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { cache_name: cache_name.into(), storage, fetcher, plugins: Plugins::default() }
    }

    pub fn with_plugins(mut self, plugins: Plugins) -> Self {
        self.plugins = plugins;
        self
    }

    /// Fetch `request` through the plugin chain.
    pub async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let request = self.plugins.request_will_fetch(request.clone()).await?;

        match self.fetcher.fetch(&request).await {
            Ok(response) => self.plugins.fetch_did_succeed(&request, response).await,
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "fetch failed");
                self.plugins.fetch_did_fail(&request, &e).await;
                Err(e)
            }
        }
    }

    /// Read the cached response for `request`.
    pub async fn cache_match(&self, request: &Request) -> Result<Option<Response>, Error> {
        self.cache_match_key(request, request.cache_key()).await
    }

    /// Read the response cached under `key`, passed through the read hooks.
    pub async fn cache_match_key(&self, request: &Request, key: &str) -> Result<Option<Response>, Error> {
        let cached = self.storage.lookup(&self.cache_name, key).await?;
        if cached.is_some() {
            tracing::debug!(cache = %self.cache_name, key, "cache hit");
        } else {
            tracing::debug!(cache = %self.cache_name, key, "cache miss");
        }
        Ok(self.plugins.cached_response_will_be_used(&self.cache_name, request, cached).await)
    }

    /// Apply the write hooks, or `default` when no plugin decides.
    ///
    /// `None` means the response must not be cached.
    pub async fn cacheable(&self, request: &Request, response: Response, default: Cacheability) -> Option<Response> {
        if self.plugins.has(Hook::CacheWillUpdate) {
            self.plugins.cache_will_update(request, response).await
        } else if default.accepts(&response) {
            Some(response)
        } else {
            tracing::debug!(url = %request.url, status = response.status, "response not cacheable");
            None
        }
    }

    /// Store `response` under `request`'s cache key if it is cacheable.
    ///
    /// Returns whether anything was written. Only GET requests are cached.
    pub async fn cache_put(&self, request: &Request, response: Response, default: Cacheability) -> Result<bool, Error> {
        if request.method != reqwest::Method::GET {
            tracing::debug!(method = %request.method, url = %request.url, "not caching non-GET request");
            return Ok(false);
        }
        let Some(response) = self.cacheable(request, response, default).await else {
            return Ok(false);
        };
        self.put_key(request, request.cache_key(), &response).await?;
        Ok(true)
    }

    /// Unconditionally store `response` under `key` and run the update hooks.
    pub async fn put_key(&self, request: &Request, key: &str, response: &Response) -> Result<(), Error> {
        let old_response = if self.plugins.has(Hook::CacheDidUpdate) {
            self.storage.lookup(&self.cache_name, key).await?
        } else {
            None
        };

        self.storage.put(&self.cache_name, key, response).await?;

        let update = CacheUpdate {
            cache_name: &self.cache_name,
            cache_key: key,
            request,
            old_response: old_response.as_ref(),
            new_response: response,
        };
        self.plugins.cache_did_update(&update).await;
        Ok(())
    }

    /// Fetch `request` and store the response, logging write failures.
    pub async fn fetch_and_cache_put(&self, request: &Request, default: Cacheability) -> Result<Response, Error> {
        let response = self.fetch(request).await?;
        if let Err(e) = self.cache_put(request, response.clone(), default).await {
            tracing::warn!(cache = %self.cache_name, url = %request.url, error = %e, "failed to cache response");
        }
        Ok(response)
    }

    /// Offer a failed result to the `handler_did_error` hooks.
    pub async fn recover(&self, request: &Request, result: Result<Response, Error>) -> Result<Response, Error> {
        match result {
            Ok(response) => Ok(response),
            Err(e) => match self.plugins.handler_did_error(request, &e).await {
                Some(fallback) => {
                    tracing::debug!(url = %request.url, error = %e, "using plugin fallback response");
                    Ok(fallback)
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::CacheableResponsePlugin;
    use crate::test_utils::{StubFetcher, request};
    use workbox_core::CacheDb;

    async fn options(fetcher: Arc<StubFetcher>) -> (StrategyOptions, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        (StrategyOptions::new("runtime", Arc::new(db.clone()), fetcher), db)
    }

    #[test]
    fn test_default_cacheability() {
        assert!(Cacheability::Ok.accepts(&Response::new("/a", 200, "")));
        assert!(!Cacheability::Ok.accepts(&Response::opaque("/a")));
        assert!(Cacheability::OkOrOpaque.accepts(&Response::opaque("/a")));
        assert!(!Cacheability::OkOrOpaque.accepts(&Response::new("/a", 404, "")));
    }

    #[tokio::test]
    async fn test_cache_put_skips_non_get() {
        let (options, db) = options(Arc::new(StubFetcher::new())).await;
        let req = request("https://example.com/a").with_method(reqwest::Method::POST);

        let written = options.cache_put(&req, Response::new("/a", 200, "x"), Cacheability::Ok).await.unwrap();

        assert!(!written);
        assert!(db.keys("runtime").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plugin_overrides_default_cacheability() {
        let (options, db) = options(Arc::new(StubFetcher::new())).await;
        let plugin = CacheableResponsePlugin::statuses([404]).unwrap();
        let options = options.with_plugins(Plugins::new(vec![Arc::new(plugin)]));
        let req = request("https://example.com/missing");

        let written = options.cache_put(&req, Response::new("/missing", 404, ""), Cacheability::Ok).await.unwrap();

        assert!(written);
        assert_eq!(db.keys("runtime").await.unwrap(), vec!["https://example.com/missing".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_reports_failures() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.fail("https://example.com/down");
        let (options, _db) = options(fetcher.clone()).await;

        let err = options.fetch(&request("https://example.com/down")).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(fetcher.count("https://example.com/down"), 1);
    }
}
