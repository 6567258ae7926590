//! Precache controller.
//!
//! Owns the manifest for one precache and the collaborators needed to act
//! on it. Installing fetches and stores whatever the diff against the
//! installed record says is new or changed; activating deletes whatever the
//! installed record no longer references.
//!
//! One controller is built at startup and shared by reference; tests build
//! as many independent controllers as they like.

mod cleanup;
mod install;
mod route;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use regex::Regex;
use serde_json::Value;
use url::Url;
use workbox_core::precache::{RawEntry, load_manifest};
use workbox_core::{
    AppConfig, CacheNames, CacheStorage, Error, InstallPolicy, InstallStore, InstalledEntry, ManifestEntry, Response,
};

use crate::fetch::{Fetcher, Request, resolve, strip_ignored_params};
use crate::plugins::Plugins;
use crate::strategies::StrategyOptions;

pub use cleanup::CleanupReport;
pub use install::{FailedEntry, InstallReport};
pub use route::{PrecacheMatcher, PrecacheStrategy};

/// Settings for one precache.
#[derive(Debug, Clone)]
pub struct PrecacheOptions {
    pub cache_names: CacheNames,
    /// Only caches sharing this prefix are considered for outdated cleanup.
    pub cache_prefix: String,
    pub base_url: Option<Url>,
    pub install_policy: InstallPolicy,
    pub rollback_failed_install: bool,
    pub install_concurrency: usize,
    pub ignore_url_parameters: Vec<Regex>,
    pub directory_index: Option<String>,
    pub clean_urls: bool,
    pub cleanup_outdated_caches: bool,
}

impl Default for PrecacheOptions {
    fn default() -> Self {
        Self {
            cache_names: CacheNames::default(),
            cache_prefix: "workbox".to_string(),
            base_url: None,
            install_policy: InstallPolicy::default(),
            rollback_failed_install: true,
            install_concurrency: 8,
            ignore_url_parameters: Vec::new(),
            directory_index: Some("index.html".to_string()),
            clean_urls: true,
            cleanup_outdated_caches: true,
        }
    }
}

impl PrecacheOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let base_url = config
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| Error::InvalidUrl(format!("base_url: {e}")))?;

        let ignore_url_parameters = config
            .ignore_url_parameters
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidInput(format!("ignore_url_parameters: {e}")))?;

        Ok(Self {
            cache_names: config.cache_names(),
            cache_prefix: config.cache_prefix.clone(),
            base_url,
            install_policy: config.install_policy,
            rollback_failed_install: config.rollback_failed_install,
            install_concurrency: config.install_concurrency.max(1),
            ignore_url_parameters,
            directory_index: config.directory_index.clone(),
            clean_urls: config.clean_urls,
            cleanup_outdated_caches: config.cleanup_outdated_caches,
        })
    }
}

/// Manifest plus collaborators for one precache.
pub struct PrecacheController {
    options: PrecacheOptions,
    strategy: StrategyOptions,
    installs: Arc<dyn InstallStore>,
    /// Manifest most recently set, pending until an install records it.
    manifest: RwLock<Vec<ManifestEntry>>,
    /// URL to cache key for the installed record; what requests are served from.
    served: RwLock<HashMap<String, String>>,
    /// Held for a whole install or activate so cleanup never sees keys an
    /// unfinished install has written but not yet recorded.
    lifecycle: tokio::sync::Mutex<()>,
}

impl PrecacheController {
    pub fn new(
        options: PrecacheOptions, storage: Arc<dyn CacheStorage>, installs: Arc<dyn InstallStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let strategy = StrategyOptions::new(options.cache_names.precache(), storage, fetcher);
        Self {
            options,
            strategy,
            installs,
            manifest: RwLock::new(Vec::new()),
            served: RwLock::new(HashMap::new()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Plugins run around precache fetches and writes.
    pub fn with_plugins(mut self, plugins: Plugins) -> Self {
        self.strategy = self.strategy.with_plugins(plugins);
        self
    }

    pub fn options(&self) -> &PrecacheOptions {
        &self.options
    }

    pub fn cache_name(&self) -> &str {
        self.options.cache_names.precache()
    }

    pub(crate) fn strategy_options(&self) -> &StrategyOptions {
        &self.strategy
    }

    /// Replace the manifest with raw build output.
    ///
    /// URLs are resolved against the base URL before duplicate detection,
    /// so `/app.js` and `https://site/app.js` count as the same entry.
    /// Lookups keep answering from the installed record until `install`
    /// records the new manifest.
    pub fn set_manifest(&self, raw: &[RawEntry]) -> Result<Vec<ManifestEntry>, Error> {
        let resolved = raw
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let (url, revision) = match item {
                    RawEntry::Url(url) => (url.as_str(), None),
                    RawEntry::Revisioned { url, revision } => (url.as_str(), revision.clone()),
                };
                let url = resolve(self.options.base_url.as_ref(), url)
                    .map_err(|e| Error::InvalidManifestEntry { index, reason: e.to_string() })?;
                Ok(RawEntry::Revisioned { url: url.to_string(), revision })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let entries = load_manifest(&resolved)?;
        *self.manifest.write().map_err(|_| poisoned())? = entries.clone();

        tracing::info!(cache = self.cache_name(), entries = entries.len(), "precache manifest set");
        Ok(entries)
    }

    /// Replace the manifest with JSON build output.
    pub fn set_manifest_json(&self, values: &[Value]) -> Result<Vec<ManifestEntry>, Error> {
        let raw = values
            .iter()
            .enumerate()
            .map(|(index, value)| RawEntry::from_value(index, value))
            .collect::<Result<Vec<_>, _>>()?;
        self.set_manifest(&raw)
    }

    /// The current manifest, in manifest order.
    pub fn manifest(&self) -> Result<Vec<ManifestEntry>, Error> {
        Ok(self.manifest.read().map_err(|_| poisoned())?.clone())
    }

    /// Serve lookups from the persisted installed record.
    ///
    /// Called once at startup; install and activate keep it current after that.
    pub async fn reload_installed(&self) -> Result<usize, Error> {
        let installed = self.installs.load_installed(self.cache_name()).await?;
        self.serve(&installed)?;
        Ok(installed.len())
    }

    pub(crate) fn serve(&self, record: &[InstalledEntry]) -> Result<(), Error> {
        let keys = record.iter().map(|entry| (entry.url.clone(), entry.cache_key.clone())).collect();
        *self.served.write().map_err(|_| poisoned())? = keys;
        Ok(())
    }

    /// Cache key for a precached URL, resolving relative URLs first.
    pub fn get_cache_key_for_url(&self, url: &str) -> Option<String> {
        let resolved = resolve(self.options.base_url.as_ref(), url).ok()?;
        self.key_for(resolved.as_str())
    }

    fn key_for(&self, url: &str) -> Option<String> {
        match self.served.read() {
            Ok(served) => served.get(url).cloned(),
            Err(_) => None,
        }
    }

    /// Cache key for `url`, trying each lookup variation in turn.
    pub fn lookup_cache_key(&self, url: &Url) -> Option<String> {
        url_variations(url, &self.options).into_iter().find_map(|candidate| self.key_for(candidate.as_str()))
    }

    /// Precached response for `url`, if installed.
    pub async fn match_precache(&self, url: &str) -> Result<Option<Response>, Error> {
        let resolved = resolve(self.options.base_url.as_ref(), url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let Some(key) = self.lookup_cache_key(&resolved) else {
            return Ok(None);
        };
        self.strategy.cache_match_key(&Request::get(resolved), &key).await
    }
}

impl std::fmt::Debug for PrecacheController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrecacheController")
            .field("cache_name", &self.cache_name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn poisoned() -> Error {
    Error::InvalidInput("precache state lock poisoned".to_string())
}

/// URLs tried, in order, when looking a request up in the precache.
///
/// The request URL itself (without fragment), then with ignored query
/// parameters stripped, then the directory index for paths ending in `/`,
/// then the `.html` clean URL.
pub fn url_variations(url: &Url, options: &PrecacheOptions) -> Vec<Url> {
    let mut original = url.clone();
    original.set_fragment(None);

    let stripped = strip_ignored_params(&original, &options.ignore_url_parameters);
    let mut variations = vec![original];
    if !variations.contains(&stripped) {
        variations.push(stripped.clone());
    }

    if let Some(index) = options.directory_index.as_deref()
        && stripped.path().ends_with('/')
    {
        let mut directory = stripped.clone();
        directory.set_path(&format!("{}{}", stripped.path(), index));
        variations.push(directory);
    }

    if options.clean_urls && !stripped.path().ends_with('/') {
        let mut clean = stripped.clone();
        clean.set_path(&format!("{}.html", stripped.path()));
        variations.push(clean);
    }

    variations
}

#[cfg(test)]
mod tests {
    use super::*;
    use workbox_core::CacheDb;

    use crate::test_utils::StubFetcher;

    pub(super) fn options() -> PrecacheOptions {
        PrecacheOptions {
            base_url: Some(Url::parse("https://example.com/").unwrap()),
            ignore_url_parameters: vec![Regex::new("^utm_").unwrap()],
            ..Default::default()
        }
    }

    async fn controller() -> PrecacheController {
        with_fetcher(Arc::new(StubFetcher::new())).await.0
    }

    async fn with_fetcher(fetcher: Arc<StubFetcher>) -> (PrecacheController, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        (PrecacheController::new(options(), Arc::new(db.clone()), Arc::new(db.clone()), fetcher), db)
    }

    fn raw(url: &str, revision: Option<&str>) -> RawEntry {
        RawEntry::Revisioned { url: url.to_string(), revision: revision.map(str::to_string) }
    }

    #[test]
    fn test_options_from_config() {
        let config = AppConfig { base_url: Some("https://example.com".into()), scope: "app".into(), ..Default::default() };
        let options = PrecacheOptions::from_config(&config).unwrap();
        assert_eq!(options.cache_names.precache(), "workbox-precache-v2-app");
        assert_eq!(options.ignore_url_parameters.len(), 2);

        let bad = AppConfig { ignore_url_parameters: vec!["(".into()], ..Default::default() };
        assert!(PrecacheOptions::from_config(&bad).is_err());
    }

    #[tokio::test]
    async fn test_set_manifest_resolves_relative_urls() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond("https://example.com/app.js", 200, "app");
        fetcher.respond("https://example.com/index.html", 200, "index");
        let (controller, _db) = with_fetcher(fetcher).await;
        let entries = controller.set_manifest(&[raw("/app.js", Some("1")), raw("index.html", None)]).unwrap();

        assert_eq!(entries[0].url, "https://example.com/app.js");
        assert_eq!(entries[0].cache_key, "https://example.com/app.js?__WB_REVISION__=1");
        assert!(controller.get_cache_key_for_url("/app.js").is_none());

        controller.install().await.unwrap();
        assert_eq!(
            controller.get_cache_key_for_url("/app.js").as_deref(),
            Some("https://example.com/app.js?__WB_REVISION__=1")
        );
        assert!(controller.get_cache_key_for_url("/missing.js").is_none());
    }

    #[tokio::test]
    async fn test_set_manifest_detects_duplicates_after_resolution() {
        let controller = controller().await;
        let err = controller
            .set_manifest(&[raw("/app.js", Some("1")), raw("https://example.com/app.js", Some("2"))])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEntry { .. }));
    }

    #[tokio::test]
    async fn test_set_manifest_json_rejects_bad_items() {
        let controller = controller().await;
        let err = controller.set_manifest_json(&[serde_json::json!({"revision": "1"})]).unwrap_err();
        assert!(matches!(err, Error::InvalidManifestEntry { index: 0, .. }));
    }

    #[test]
    fn test_url_variations() {
        let options = options();
        let url = Url::parse("https://example.com/docs/?utm_source=x#top").unwrap();
        let variations: Vec<String> = url_variations(&url, &options).iter().map(|u| u.to_string()).collect();
        assert_eq!(
            variations,
            vec![
                "https://example.com/docs/?utm_source=x".to_string(),
                "https://example.com/docs/".to_string(),
                "https://example.com/docs/index.html".to_string(),
            ]
        );

        let url = Url::parse("https://example.com/about").unwrap();
        let variations: Vec<String> = url_variations(&url, &options).iter().map(|u| u.to_string()).collect();
        assert_eq!(variations, vec!["https://example.com/about".to_string(), "https://example.com/about.html".to_string()]);
    }

    #[tokio::test]
    async fn test_lookup_uses_variations() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond("https://example.com/index.html", 200, "index");
        fetcher.respond("https://example.com/about.html", 200, "about");
        let (controller, _db) = with_fetcher(fetcher).await;
        controller.set_manifest(&[raw("/index.html", Some("abc")), raw("/about.html", None)]).unwrap();
        controller.install().await.unwrap();

        let root = Url::parse("https://example.com/?utm_campaign=launch").unwrap();
        assert_eq!(
            controller.lookup_cache_key(&root).as_deref(),
            Some("https://example.com/index.html?__WB_REVISION__=abc")
        );
        let clean = Url::parse("https://example.com/about").unwrap();
        assert_eq!(controller.lookup_cache_key(&clean).as_deref(), Some("https://example.com/about.html"));
    }

    #[tokio::test]
    async fn test_reload_installed_serves_persisted_record() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond("https://example.com/app.js", 200, "app");
        let (first, db) = with_fetcher(fetcher.clone()).await;
        first.set_manifest(&[raw("/app.js", Some("1"))]).unwrap();
        first.install().await.unwrap();

        let restarted = PrecacheController::new(options(), Arc::new(db.clone()), Arc::new(db), fetcher);
        assert!(restarted.get_cache_key_for_url("/app.js").is_none());

        assert_eq!(restarted.reload_installed().await.unwrap(), 1);
        let served = restarted.match_precache("/app.js").await.unwrap().unwrap();
        assert_eq!(served.body, b"app");
    }
}
