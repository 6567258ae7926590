//! cache_purge tool implementation.
//!
//! Trims a cache to its newest entries or drops it entirely.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use workbox_core::{CacheStorage, Error};

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Cache to purge. Defaults to the runtime cache.
    #[serde(default)]
    pub cache_name: Option<String>,

    /// Keep only the newest N entries (LRU purge).
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Delete the whole cache.
    #[serde(default)]
    pub delete_cache: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub cache_name: String,
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(state: &AppState, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.max_entries.is_none() && !params.delete_cache {
        return Err(Error::InvalidInput("Either max_entries or delete_cache must be specified".to_string()).into());
    }

    let cache_name = params.cache_name.unwrap_or_else(|| state.runtime_cache_name());

    if cache_name == state.precache.cache_name() {
        return Err(Error::InvalidInput(
            "the precache is managed by precache_install and precache_activate".to_string(),
        )
        .into());
    }

    let deleted = if params.delete_cache {
        state.db.clear_expiration(&cache_name).await?;
        state.db.delete_cache(&cache_name).await?
    } else if let Some(max_entries) = params.max_entries {
        state.db.purge_lru_entries(&cache_name, max_entries).await?
    } else {
        0
    };

    tracing::info!(cache = %cache_name, deleted, "cache purged");
    json_result(&CachePurgeOutput { cache_name, deleted })
}
