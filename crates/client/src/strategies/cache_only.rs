use async_trait::async_trait;
use workbox_core::{Error, Response};

use super::{Strategy, StrategyOptions};
use crate::fetch::Request;
use crate::lifetime::Lifetime;

/// Serve from the cache or fail with `NoResponse`.
#[derive(Debug, Clone)]
pub struct CacheOnly {
    options: StrategyOptions,
}

impl CacheOnly {
    pub fn new(options: StrategyOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Strategy for CacheOnly {
    fn name(&self) -> &'static str {
        "cache-only"
    }

    async fn handle(&self, request: &Request, _lifetime: &Lifetime) -> Result<Response, Error> {
        let result = match self.options.cache_match(request).await {
            Ok(Some(cached)) => Ok(cached),
            Ok(None) => Err(Error::NoResponse { url: request.url.to_string() }),
            Err(e) => Err(e),
        };
        self.options.recover(request, result).await
    }
}
