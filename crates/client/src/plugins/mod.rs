//! Plugin hooks for strategies and precaching.
//!
//! A plugin implements any subset of the hooks below and lists the ones it
//! implements in [`Plugin::hooks`]. Executors only call a hook on plugins
//! that declare it, always in registration order.

pub mod cacheable_response;
pub mod expiration;

use std::sync::Arc;

use async_trait::async_trait;
use workbox_core::{Error, Response};

use crate::fetch::Request;

pub use cacheable_response::CacheableResponsePlugin;
pub use expiration::ExpirationPlugin;

/// Names of the hooks a plugin can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    RequestWillFetch,
    FetchDidFail,
    FetchDidSucceed,
    CacheWillUpdate,
    CacheDidUpdate,
    CachedResponseWillBeUsed,
    HandlerDidError,
}

/// Details passed to [`Plugin::cache_did_update`].
#[derive(Debug)]
pub struct CacheUpdate<'a> {
    pub cache_name: &'a str,
    pub cache_key: &'a str,
    pub request: &'a Request,
    pub old_response: Option<&'a Response>,
    pub new_response: &'a Response,
}

/// Lifecycle callbacks invoked around fetches and cache access.
///
/// Every hook has a pass-through default, so implementors only write the
/// ones they list in [`hooks`](Plugin::hooks).
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Hooks this plugin implements.
    fn hooks(&self) -> &'static [Hook];

    /// Rewrite a request before it goes to the network.
    async fn request_will_fetch(&self, request: Request) -> Result<Request, Error> {
        Ok(request)
    }

    /// Observe a request that failed without a response.
    async fn fetch_did_fail(&self, _request: &Request, _error: &Error) {}

    /// Inspect or replace a network response.
    async fn fetch_did_succeed(&self, _request: &Request, response: Response) -> Result<Response, Error> {
        Ok(response)
    }

    /// Decide whether a response may be cached. `None` vetoes the write.
    async fn cache_will_update(&self, _request: &Request, response: Response) -> Option<Response> {
        Some(response)
    }

    /// Observe a completed cache write.
    async fn cache_did_update(&self, _update: &CacheUpdate<'_>) {}

    /// Filter or replace a cache read before it is used.
    async fn cached_response_will_be_used(
        &self, _cache_name: &str, _request: &Request, cached: Option<Response>,
    ) -> Option<Response> {
        cached
    }

    /// Supply a fallback response when a handler fails.
    async fn handler_did_error(&self, _request: &Request, _error: &Error) -> Option<Response> {
        None
    }
}

/// Ordered collection of plugins.
#[derive(Clone, Default)]
pub struct Plugins(Vec<Arc<dyn Plugin>>);

impl Plugins {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self(plugins)
    }

    pub fn push(&mut self, plugin: Arc<dyn Plugin>) {
        self.0.push(plugin);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any plugin implements `hook`.
    pub fn has(&self, hook: Hook) -> bool {
        self.0.iter().any(|p| p.hooks().contains(&hook))
    }

    /// Plugins implementing `hook`, in registration order.
    pub fn with_hook(&self, hook: Hook) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.0.iter().filter(move |p| p.hooks().contains(&hook))
    }

    pub async fn request_will_fetch(&self, mut request: Request) -> Result<Request, Error> {
        for plugin in self.with_hook(Hook::RequestWillFetch) {
            request = plugin.request_will_fetch(request).await?;
        }
        Ok(request)
    }

    pub async fn fetch_did_fail(&self, request: &Request, error: &Error) {
        for plugin in self.with_hook(Hook::FetchDidFail) {
            plugin.fetch_did_fail(request, error).await;
        }
    }

    pub async fn fetch_did_succeed(&self, request: &Request, mut response: Response) -> Result<Response, Error> {
        for plugin in self.with_hook(Hook::FetchDidSucceed) {
            response = plugin.fetch_did_succeed(request, response).await?;
        }
        Ok(response)
    }

    /// Run `cache_will_update` hooks, stopping at the first veto.
    pub async fn cache_will_update(&self, request: &Request, response: Response) -> Option<Response> {
        let mut current = response;
        for plugin in self.with_hook(Hook::CacheWillUpdate) {
            match plugin.cache_will_update(request, current).await {
                Some(next) => current = next,
                None => {
                    tracing::debug!(plugin = plugin.name(), url = %request.url, "cache write vetoed");
                    return None;
                }
            }
        }
        Some(current)
    }

    pub async fn cache_did_update(&self, update: &CacheUpdate<'_>) {
        for plugin in self.with_hook(Hook::CacheDidUpdate) {
            plugin.cache_did_update(update).await;
        }
    }

    pub async fn cached_response_will_be_used(
        &self, cache_name: &str, request: &Request, cached: Option<Response>,
    ) -> Option<Response> {
        let mut current = cached;
        for plugin in self.with_hook(Hook::CachedResponseWillBeUsed) {
            current = plugin.cached_response_will_be_used(cache_name, request, current).await;
        }
        current
    }

    /// First fallback offered by a `handler_did_error` hook.
    pub async fn handler_did_error(&self, request: &Request, error: &Error) -> Option<Response> {
        for plugin in self.with_hook(Hook::HandlerDidError) {
            if let Some(response) = plugin.handler_did_error(request, error).await {
                return Some(response);
            }
        }
        None
    }
}

impl std::fmt::Debug for Plugins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter().map(|p| p.name())).finish()
    }
}
