//! Serving precached responses through the router.

use std::sync::Arc;

use async_trait::async_trait;
use workbox_core::{Error, Response};

use super::PrecacheController;
use crate::fetch::Request;
use crate::lifetime::Lifetime;
use crate::routing::{MatchContext, Matcher, Route};
use crate::strategies::{Cacheability, Strategy};

/// Matches requests whose URL, or one of its lookup variations, is precached.
#[derive(Debug, Clone)]
pub struct PrecacheMatcher {
    controller: Arc<PrecacheController>,
}

impl PrecacheMatcher {
    pub fn new(controller: Arc<PrecacheController>) -> Self {
        Self { controller }
    }
}

impl Matcher for PrecacheMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        self.controller.lookup_cache_key(&ctx.request.url).is_some()
    }
}

/// Serves from the precache, falling back to the network on a miss.
///
/// A response fetched on a miss is written back under the entry's cache
/// key, so the next request is served from the precache again.
#[derive(Debug, Clone)]
pub struct PrecacheStrategy {
    controller: Arc<PrecacheController>,
    fallback_to_network: bool,
    bound_key: Option<String>,
}

impl PrecacheStrategy {
    pub fn new(controller: Arc<PrecacheController>) -> Self {
        Self { controller, fallback_to_network: true, bound_key: None }
    }

    pub fn fallback_to_network(mut self, enabled: bool) -> Self {
        self.fallback_to_network = enabled;
        self
    }

    async fn respond(&self, request: &Request) -> Result<Response, Error> {
        let key = match &self.bound_key {
            Some(key) => Some(key.clone()),
            None => self.controller.lookup_cache_key(&request.url),
        };
        let options = self.controller.strategy_options();

        if let Some(key) = key.as_deref()
            && let Some(cached) = options.cache_match_key(request, key).await?
        {
            return Ok(cached);
        }

        if !self.fallback_to_network {
            return Err(Error::NoResponse { url: request.url.to_string() });
        }

        tracing::warn!(url = %request.url, "precached response missing, using network");
        let response = options.fetch(request).await?;

        if let Some(key) = key.as_deref()
            && let Some(cacheable) = options.cacheable(request, response.clone(), Cacheability::OkOrOpaque).await
            && let Err(e) = options.put_key(request, key, &cacheable).await
        {
            tracing::warn!(url = %request.url, error = %e, "failed to restore precached response");
        }
        Ok(response)
    }
}

#[async_trait]
impl Strategy for PrecacheStrategy {
    fn name(&self) -> &'static str {
        "precache"
    }

    async fn handle(&self, request: &Request, _lifetime: &Lifetime) -> Result<Response, Error> {
        let result = self.respond(request).await;
        self.controller.strategy_options().recover(request, result).await
    }
}

impl PrecacheController {
    /// A route serving every precached URL.
    pub fn create_route(self: &Arc<Self>) -> Route {
        Route::new(PrecacheMatcher::new(self.clone()), Arc::new(PrecacheStrategy::new(self.clone())))
    }

    /// A handler that always answers with the precached response for `url`.
    ///
    /// Useful as a navigation fallback, e.g. serving an app shell.
    pub fn create_handler_bound_to_url(self: &Arc<Self>, url: &str) -> Result<Arc<dyn Strategy>, Error> {
        let key = self
            .get_cache_key_for_url(url)
            .ok_or_else(|| Error::InvalidInput(format!("{url} is not in the precache manifest")))?;
        Ok(Arc::new(PrecacheStrategy { controller: self.clone(), fallback_to_network: false, bound_key: Some(key) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use workbox_core::precache::RawEntry;
    use workbox_core::{CacheDb, CacheStorage};

    use crate::precache::tests::options;
    use crate::routing::{NavigationMatcher, Router};
    use crate::test_utils::{StubFetcher, request};

    const APP: &str = "https://example.com/app.js";
    const SHELL: &str = "https://example.com/index.html";
    const PRECACHE: &str = "workbox-precache-v2";

    async fn installed() -> (Arc<PrecacheController>, Arc<StubFetcher>, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(APP, 200, "app");
        fetcher.respond(SHELL, 200, "shell");
        let controller = Arc::new(PrecacheController::new(
            options(),
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            fetcher.clone(),
        ));
        controller
            .set_manifest(&[
                RawEntry::Revisioned { url: "/app.js".into(), revision: Some("7".into()) },
                RawEntry::Url("/index.html".into()),
            ])
            .unwrap();
        controller.install().await.unwrap();
        (controller, fetcher, db)
    }

    #[tokio::test]
    async fn test_route_serves_precache_without_network() {
        let (controller, fetcher, _db) = installed().await;
        let mut router = Router::new(controller.options().base_url.clone());
        router.register_route(controller.create_route());

        let response = router.handle_request(&request(APP), &Lifetime::new()).await.unwrap().unwrap();

        assert_eq!(response.body, b"app");
        assert_eq!(fetcher.count(APP), 1);
        assert!(router.find_route(&request("https://example.com/other.js")).is_none());
    }

    #[tokio::test]
    async fn test_directory_request_served_from_index() {
        let (controller, _fetcher, _db) = installed().await;
        let mut router = Router::new(controller.options().base_url.clone());
        router.register_route(controller.create_route());

        let response = router.handle_request(&request("https://example.com/"), &Lifetime::new()).await.unwrap().unwrap();
        assert_eq!(response.body, b"shell");
    }

    #[tokio::test]
    async fn test_missing_entry_falls_back_and_restores() {
        let (controller, fetcher, db) = installed().await;
        let key = controller.get_cache_key_for_url(APP).unwrap();
        db.delete(PRECACHE, &key).await.unwrap();

        let strategy = PrecacheStrategy::new(controller.clone());
        let response = strategy.handle(&request(APP), &Lifetime::new()).await.unwrap();

        assert_eq!(response.body, b"app");
        assert_eq!(fetcher.count(APP), 2);
        assert!(db.lookup(PRECACHE, &key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bound_handler_serves_app_shell_for_navigations() {
        let (controller, _fetcher, _db) = installed().await;
        let mut router = Router::new(controller.options().base_url.clone());
        let shell = controller.create_handler_bound_to_url("/index.html").unwrap();
        router.register_route(Route::navigation(NavigationMatcher::new().deny(Regex::new("^/api").unwrap()), shell));

        let nav = Request::navigate(url::Url::parse("https://example.com/settings/profile").unwrap());
        let response = router.handle_request(&nav, &Lifetime::new()).await.unwrap().unwrap();
        assert_eq!(response.body, b"shell");

        let api = Request::navigate(url::Url::parse("https://example.com/api/me").unwrap());
        assert!(router.find_route(&api).is_none());
    }

    #[tokio::test]
    async fn test_bound_handler_requires_precached_url() {
        let (controller, _fetcher, _db) = installed().await;
        assert!(controller.create_handler_bound_to_url("/nope.html").is_err());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_serving_installed_revision() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(APP, 200, "v1");
        let controller =
            Arc::new(PrecacheController::new(options(), Arc::new(db.clone()), Arc::new(db.clone()), fetcher.clone()));
        let revision = |r: &str| [RawEntry::Revisioned { url: "/app.js".into(), revision: Some(r.into()) }];

        controller.set_manifest(&revision("1")).unwrap();
        controller.install().await.unwrap();
        controller.activate().await.unwrap();

        fetcher.respond(APP, 500, "boom");
        controller.set_manifest(&revision("2")).unwrap();
        assert!(controller.install().await.is_err());
        fetcher.fail(APP);

        let response = PrecacheStrategy::new(controller.clone()).handle(&request(APP), &Lifetime::new()).await.unwrap();
        assert_eq!(response.body, b"v1");
        assert_eq!(controller.match_precache(APP).await.unwrap().unwrap().body, b"v1");

        controller.activate().await.unwrap();
        assert_eq!(db.keys(PRECACHE).await.unwrap(), vec![format!("{APP}?__WB_REVISION__=1")]);
    }
}
