//! precache_install, precache_activate and precache_status tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use workbox_client::{CleanupReport, InstallReport};
use workbox_core::{CacheStorage, InstallStore, InstalledEntry, ManifestEntry};

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the precache_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrecacheInstallParams {
    /// Manifest items: URL strings or `{"url", "revision"}` objects.
    pub manifest: Vec<Value>,
}

/// Output from the precache_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrecacheInstallOutput {
    /// Normalized manifest entries.
    pub entries: Vec<ManifestEntry>,
    pub report: InstallReport,
}

/// Output from the precache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrecacheStatusOutput {
    pub cache_name: String,
    /// Manifest most recently passed to precache_install.
    pub manifest: Vec<ManifestEntry>,
    /// Entries recorded by the last successful install.
    pub installed: Vec<InstalledEntry>,
    /// Number of responses currently stored in the precache.
    pub cached_responses: usize,
    /// Stored responses no installed entry references; removed on activate.
    pub stale_keys: Vec<String>,
}

/// Implementation of the precache_install tool.
pub async fn install_impl(state: &AppState, params: PrecacheInstallParams) -> Result<CallToolResult, McpError> {
    let entries = state.precache.set_manifest_json(&params.manifest)?;
    let report = state.precache.install().await?;
    json_result(&PrecacheInstallOutput { entries, report })
}

/// Implementation of the precache_activate tool.
pub async fn activate_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let report: CleanupReport = state.precache.activate().await?;
    json_result(&report)
}

/// Implementation of the precache_status tool.
pub async fn status_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let cache_name = state.precache.cache_name().to_string();
    let installed = state.db.load_installed(&cache_name).await?;
    let keys = state.db.keys(&cache_name).await?;

    let stale_keys =
        keys.iter().filter(|key| !installed.iter().any(|entry| &entry.cache_key == *key)).cloned().collect();

    json_result(&PrecacheStatusOutput {
        manifest: state.precache.manifest()?,
        cached_responses: keys.len(),
        installed,
        stale_keys,
        cache_name,
    })
}
