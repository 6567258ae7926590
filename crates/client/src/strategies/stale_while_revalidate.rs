use async_trait::async_trait;
use workbox_core::{Error, Response};

use super::{Cacheability, Strategy, StrategyOptions};
use crate::fetch::Request;
use crate::lifetime::Lifetime;

/// Serve the cached response immediately and refresh it from the network
/// in the background. On a miss the network response is returned.
#[derive(Debug, Clone)]
pub struct StaleWhileRevalidate {
    options: StrategyOptions,
}

impl StaleWhileRevalidate {
    pub fn new(options: StrategyOptions) -> Self {
        Self { options }
    }

    async fn respond(&self, request: &Request, lifetime: &Lifetime) -> Result<Response, Error> {
        let cached = match self.options.cache_match(request).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache read failed, revalidating");
                None
            }
        };

        if let Some(cached) = cached {
            let options = self.options.clone();
            let request = request.clone();
            lifetime.wait_until(async move {
                if let Err(e) = options.fetch_and_cache_put(&request, Cacheability::OkOrOpaque).await {
                    tracing::debug!(url = %request.url, error = %e, "background revalidation failed");
                }
            });
            return Ok(cached);
        }

        let response = self.options.fetch(request).await?;

        let options = self.options.clone();
        let owned = request.clone();
        let to_store = response.clone();
        lifetime.wait_until(async move {
            if let Err(e) = options.cache_put(&owned, to_store, Cacheability::OkOrOpaque).await {
                tracing::warn!(url = %owned.url, error = %e, "failed to cache response");
            }
        });
        Ok(response)
    }
}

#[async_trait]
impl Strategy for StaleWhileRevalidate {
    fn name(&self) -> &'static str {
        "stale-while-revalidate"
    }

    async fn handle(&self, request: &Request, lifetime: &Lifetime) -> Result<Response, Error> {
        let result = self.respond(request, lifetime).await;
        self.options.recover(request, result).await
    }
}
