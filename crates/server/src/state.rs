//! Shared server state built once at startup.

use std::sync::Arc;
use std::time::Duration;

use url::Url;
use workbox_client::{
    ExpirationPlugin, Fetcher, Method, NetworkFirst, Plugins, PrecacheController, PrecacheOptions, Router,
    StrategyOptions,
};
use workbox_core::{AppConfig, CacheDb, Error};

/// Everything the tools operate on.
pub struct AppState {
    pub config: AppConfig,
    pub db: CacheDb,
    pub fetcher: Arc<dyn Fetcher>,
    pub precache: Arc<PrecacheController>,
    pub router: Router,
}

impl AppState {
    /// Wire the precache controller and the route table.
    ///
    /// Precached URLs are served by the precache route; everything else
    /// goes network-first through the runtime cache.
    pub fn new(config: AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let options = PrecacheOptions::from_config(&config)?;
        let names = options.cache_names.clone();
        let origin = options.base_url.clone().map(origin_of);

        let precache =
            Arc::new(PrecacheController::new(options, Arc::new(db.clone()), Arc::new(db.clone()), fetcher.clone()));

        let mut plugins = Plugins::default();
        if config.runtime_max_entries.is_some() || config.runtime_max_age_secs.is_some() {
            let expiration = ExpirationPlugin::new(
                db.clone(),
                config.runtime_max_entries,
                config.runtime_max_age_secs.map(Duration::from_secs),
            )?;
            plugins.push(Arc::new(expiration));
        }

        let runtime = StrategyOptions::new(names.runtime(), Arc::new(db.clone()), fetcher.clone()).with_plugins(plugins);
        let mut network_first = NetworkFirst::new(runtime);
        if let Some(timeout) = config.network_timeout() {
            network_first = network_first.with_network_timeout(timeout);
        }

        let mut router = Router::new(origin);
        router.register_route(precache.create_route());
        router.set_default_handler(Arc::new(network_first), Method::GET);

        tracing::info!(
            precache = names.precache(),
            runtime = names.runtime(),
            routes = router.routes().len(),
            "workbox state ready"
        );

        Ok(Self { config, db, fetcher, precache, router })
    }

    pub fn runtime_cache_name(&self) -> String {
        self.config.cache_names().runtime().to_string()
    }
}

fn origin_of(mut url: Url) -> Url {
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    url
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_state_wires_precache_route_and_default() {
        let state = state(MapFetcher::default()).await;
        assert_eq!(state.router.routes().len(), 1);
        assert_eq!(state.precache.cache_name(), "workbox-precache-v2");
        assert_eq!(state.runtime_cache_name(), "workbox-runtime");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let bad = AppConfig { ignore_url_parameters: vec!["[".into()], ..Default::default() };
        assert!(AppState::new(bad, db, Arc::new(MapFetcher::default())).is_err());
    }

    #[test]
    fn test_origin_of() {
        let url = Url::parse("https://example.com/app/?v=1#x").unwrap();
        assert_eq!(origin_of(url).as_str(), "https://example.com/");
    }
}
