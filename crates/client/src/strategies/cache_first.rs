use async_trait::async_trait;
use workbox_core::{Error, Response};

use super::{Cacheability, Strategy, StrategyOptions};
use crate::fetch::Request;
use crate::lifetime::Lifetime;

/// Serve from the cache; on a miss fetch, store and return the network response.
#[derive(Debug, Clone)]
pub struct CacheFirst {
    options: StrategyOptions,
}

impl CacheFirst {
    pub fn new(options: StrategyOptions) -> Self {
        Self { options }
    }

    async fn respond(&self, request: &Request) -> Result<Response, Error> {
        if let Some(cached) = self.options.cache_match(request).await? {
            return Ok(cached);
        }
        self.options.fetch_and_cache_put(request, Cacheability::Ok).await
    }
}

#[async_trait]
impl Strategy for CacheFirst {
    fn name(&self) -> &'static str {
        "cache-first"
    }

    async fn handle(&self, request: &Request, _lifetime: &Lifetime) -> Result<Response, Error> {
        let result = self.respond(request).await;
        self.options.recover(request, result).await
    }
}
