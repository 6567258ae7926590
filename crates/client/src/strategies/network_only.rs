use std::time::Duration;

use async_trait::async_trait;
use workbox_core::{Error, Response};

use super::{Strategy, StrategyOptions};
use crate::fetch::Request;
use crate::lifetime::Lifetime;

/// Always go to the network; the cache is never read or written.
#[derive(Debug, Clone)]
pub struct NetworkOnly {
    options: StrategyOptions,
    timeout: Option<Duration>,
}

impl NetworkOnly {
    pub fn new(options: StrategyOptions) -> Self {
        Self { options, timeout: None }
    }

    /// Fail with `FetchTimeout` when the network takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn respond(&self, request: &Request) -> Result<Response, Error> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.options.fetch(request))
                .await
                .map_err(|_| Error::FetchTimeout(format!("{} after {}ms", request.url, timeout.as_millis())))?,
            None => self.options.fetch(request).await,
        }
    }
}

#[async_trait]
impl Strategy for NetworkOnly {
    fn name(&self) -> &'static str {
        "network-only"
    }

    async fn handle(&self, request: &Request, _lifetime: &Lifetime) -> Result<Response, Error> {
        let result = self.respond(request).await;
        self.options.recover(request, result).await
    }
}
