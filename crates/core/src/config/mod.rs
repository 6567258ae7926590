//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WORKBOX_*)
//! 2. TOML config file (if WORKBOX_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::names::CacheNames;

mod validation;

pub use validation::ConfigError;

/// What happens to an install when some entries fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InstallPolicy {
    /// Any failed entry aborts the install; the installed record is left untouched.
    #[default]
    AllOrNothing,
    /// Failed entries are skipped; everything that succeeded is recorded.
    BestEffort,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WORKBOX_*)
/// 2. TOML config file (if WORKBOX_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via WORKBOX_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via WORKBOX_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via WORKBOX_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via WORKBOX_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Origin that relative manifest URLs are resolved against.
    ///
    /// Also decides which requests count as same-origin for routing.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Prefix shared by every cache name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Optional suffix appended to every cache name.
    #[serde(default)]
    pub cache_suffix: Option<String>,

    /// Scope component of cache names, usually the registration scope.
    #[serde(default)]
    pub scope: String,

    /// Install behavior when entries fail to fetch or store.
    #[serde(default)]
    pub install_policy: InstallPolicy,

    /// Delete responses written by an install that was aborted.
    #[serde(default = "default_true")]
    pub rollback_failed_install: bool,

    /// Maximum number of precache entries fetched at once.
    #[serde(default = "default_install_concurrency")]
    pub install_concurrency: usize,

    /// Query parameter name patterns ignored when matching precached URLs.
    #[serde(default = "default_ignore_url_parameters")]
    pub ignore_url_parameters: Vec<String>,

    /// File appended to directory URLs when matching precached URLs.
    #[serde(default = "default_directory_index")]
    pub directory_index: Option<String>,

    /// Try `<path>.html` when matching precached URLs.
    #[serde(default = "default_true")]
    pub clean_urls: bool,

    /// Remove precaches left behind by older cache name layouts on activate.
    #[serde(default = "default_true")]
    pub cleanup_outdated_caches: bool,

    /// Network-first timeout before falling back to the runtime cache.
    #[serde(default)]
    pub network_timeout_ms: Option<u64>,

    /// Maximum entries kept in the runtime cache.
    #[serde(default)]
    pub runtime_max_entries: Option<usize>,

    /// Maximum age of runtime cache entries in seconds.
    #[serde(default)]
    pub runtime_max_age_secs: Option<u64>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./workbox-cache.sqlite")
}

fn default_user_agent() -> String {
    "workbox/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_cache_prefix() -> String {
    "workbox".into()
}

fn default_install_concurrency() -> usize {
    8
}

fn default_ignore_url_parameters() -> Vec<String> {
    vec!["^utm_".into(), "^fbclid$".into()]
}

fn default_directory_index() -> Option<String> {
    Some("index.html".into())
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            base_url: None,
            cache_prefix: default_cache_prefix(),
            cache_suffix: None,
            scope: String::new(),
            install_policy: InstallPolicy::default(),
            rollback_failed_install: true,
            install_concurrency: default_install_concurrency(),
            ignore_url_parameters: default_ignore_url_parameters(),
            directory_index: default_directory_index(),
            clean_urls: true,
            cleanup_outdated_caches: true,
            network_timeout_ms: None,
            runtime_max_entries: None,
            runtime_max_age_secs: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Network-first timeout, if configured.
    pub fn network_timeout(&self) -> Option<Duration> {
        self.network_timeout_ms.map(Duration::from_millis)
    }

    /// Cache names derived from prefix, scope and suffix.
    pub fn cache_names(&self) -> CacheNames {
        CacheNames::new(&self.cache_prefix, &self.scope, self.cache_suffix.as_deref())
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WORKBOX_`
    /// 2. TOML file from `WORKBOX_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WORKBOX_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WORKBOX_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
