use std::time::Duration;

use async_trait::async_trait;
use workbox_core::{Error, Response};

use super::{Cacheability, Strategy, StrategyOptions};
use crate::fetch::Request;
use crate::lifetime::Lifetime;

/// Try the network first, storing what it returns; fall back to the cache
/// when the fetch fails or takes longer than the optional timeout.
#[derive(Debug, Clone)]
pub struct NetworkFirst {
    options: StrategyOptions,
    network_timeout: Option<Duration>,
}

impl NetworkFirst {
    pub fn new(options: StrategyOptions) -> Self {
        Self { options, network_timeout: None }
    }

    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        self.network_timeout = Some(timeout);
        self
    }

    async fn respond(&self, request: &Request, lifetime: &Lifetime) -> Result<Response, Error> {
        match self.network_timeout {
            Some(timeout) => self.respond_with_timeout(request, lifetime, timeout).await,
            None => match self.options.fetch_and_cache_put(request, Cacheability::OkOrOpaque).await {
                Ok(response) => Ok(response),
                Err(e) => self.fall_back(request, e).await,
            },
        }
    }

    async fn respond_with_timeout(
        &self, request: &Request, lifetime: &Lifetime, timeout: Duration,
    ) -> Result<Response, Error> {
        let options = self.options.clone();
        let owned = request.clone();
        let mut network =
            tokio::spawn(async move { options.fetch_and_cache_put(&owned, Cacheability::OkOrOpaque).await });

        let outcome = tokio::time::timeout(timeout, &mut network).await;
        match outcome {
            Ok(joined) => match flatten(joined) {
                Ok(response) => Ok(response),
                Err(e) => self.fall_back(request, e).await,
            },
            Err(_) => {
                tracing::debug!(url = %request.url, timeout_ms = timeout.as_millis() as u64, "network timed out");
                if let Some(cached) = self.options.cache_match(request).await? {
                    // Let the fetch finish so the cache still gets refreshed.
                    lifetime.wait_until(async move {
                        let _ = network.await;
                    });
                    return Ok(cached);
                }
                flatten(network.await)
            }
        }
    }

    async fn fall_back(&self, request: &Request, error: Error) -> Result<Response, Error> {
        match self.options.cache_match(request).await? {
            Some(cached) => {
                tracing::debug!(url = %request.url, error = %error, "network failed, serving cached response");
                Ok(cached)
            }
            None => Err(error),
        }
    }
}

fn flatten(joined: Result<Result<Response, Error>, tokio::task::JoinError>) -> Result<Response, Error> {
    joined.map_err(|e| Error::Network(format!("fetch task failed: {e}")))?
}

#[async_trait]
impl Strategy for NetworkFirst {
    fn name(&self) -> &'static str {
        "network-first"
    }

    async fn handle(&self, request: &Request, lifetime: &Lifetime) -> Result<Response, Error> {
        let result = self.respond(request, lifetime).await;
        self.options.recover(request, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::test_utils::{StubFetcher, request};
    use workbox_core::{CacheDb, CacheStorage};

    const URL: &str = "https://example.com/news";

    async fn setup() -> (StrategyOptions, Arc<StubFetcher>, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        (StrategyOptions::new("runtime", Arc::new(db.clone()), fetcher.clone()), fetcher, db)
    }

    #[tokio::test]
    async fn test_network_response_is_cached() {
        let (options, fetcher, db) = setup().await;
        fetcher.respond(URL, 200, "fresh");

        let response = NetworkFirst::new(options).handle(&request(URL), &Lifetime::new()).await.unwrap();

        assert_eq!(response.body, b"fresh");
        assert_eq!(db.lookup("runtime", URL).await.unwrap().unwrap().body, b"fresh");
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_cache() {
        let (options, fetcher, db) = setup().await;
        fetcher.fail(URL);
        db.put("runtime", URL, &Response::new(URL, 200, "cached")).await.unwrap();

        let response = NetworkFirst::new(options).handle(&request(URL), &Lifetime::new()).await.unwrap();
        assert_eq!(response.body, b"cached");
    }

    #[tokio::test]
    async fn test_failure_without_cache_is_error() {
        let (options, fetcher, _db) = setup().await;
        fetcher.fail(URL);

        let err = NetworkFirst::new(options).handle(&request(URL), &Lifetime::new()).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_cached() {
        let (options, fetcher, db) = setup().await;
        fetcher.respond(URL, 500, "boom");

        let response = NetworkFirst::new(options).handle(&request(URL), &Lifetime::new()).await.unwrap();

        assert_eq!(response.status, 500);
        assert!(db.lookup("runtime", URL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timeout_serves_cache_and_refreshes_in_background() {
        let (options, fetcher, db) = setup().await;
        fetcher.respond(URL, 200, "fresh");
        fetcher.set_delay(Duration::from_millis(200));
        db.put("runtime", URL, &Response::new(URL, 200, "cached")).await.unwrap();

        let lifetime = Lifetime::new();
        let strategy = NetworkFirst::new(options).with_network_timeout(Duration::from_millis(20));
        let response = strategy.handle(&request(URL), &lifetime).await.unwrap();

        assert_eq!(response.body, b"cached");
        assert_eq!(lifetime.pending(), 1);

        lifetime.settled().await;
        assert_eq!(db.lookup("runtime", URL).await.unwrap().unwrap().body, b"fresh");
    }

    #[tokio::test]
    async fn test_timeout_without_cache_waits_for_network() {
        let (options, fetcher, _db) = setup().await;
        fetcher.respond(URL, 200, "slow");
        fetcher.set_delay(Duration::from_millis(50));

        let strategy = NetworkFirst::new(options).with_network_timeout(Duration::from_millis(5));
        let response = strategy.handle(&request(URL), &Lifetime::new()).await.unwrap();
        assert_eq!(response.body, b"slow");
    }
}
