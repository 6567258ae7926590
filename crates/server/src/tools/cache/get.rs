//! cache_match tool implementation.
//!
//! Looks a URL up in the precache and the runtime cache.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use workbox_client::fetch::resolve;
use workbox_core::{CacheStorage, Error, Response};

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchParams {
    /// URL to look up, absolute or relative to the configured base URL.
    pub url: String,

    /// Cache to search. Defaults to the precache, then the runtime cache.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// A stored response, with the body decoded as text.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSummary {
    pub url: String,
    pub status: u16,
    pub redirected: bool,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub body_bytes: usize,
}

impl From<Response> for ResponseSummary {
    fn from(response: Response) -> Self {
        Self {
            body: String::from_utf8_lossy(&response.body).into_owned(),
            body_bytes: response.body.len(),
            url: response.url,
            status: response.status,
            redirected: response.redirected,
            headers: response.headers,
        }
    }
}

/// Output from the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchOutput {
    /// Cache the response was found in.
    pub cache_name: String,
    pub response: ResponseSummary,
}

/// Implementation of the cache_match tool.
pub async fn match_impl(state: &AppState, params: CacheMatchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let precache_name = state.precache.cache_name().to_string();
    let runtime_name = state.runtime_cache_name();
    let url = resolve(state.precache.options().base_url.as_ref(), &params.url)
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let candidates = match params.cache_name {
        Some(name) => vec![name],
        None => vec![precache_name.clone(), runtime_name],
    };

    for cache_name in candidates {
        let found = if cache_name == precache_name {
            state.precache.match_precache(url.as_str()).await?
        } else {
            state.db.lookup(&cache_name, url.as_str()).await?
        };
        if let Some(response) = found {
            tracing::debug!(cache = %cache_name, url = %url, "cache_match hit");
            return json_result(&CacheMatchOutput { cache_name, response: response.into() });
        }
    }

    Err(Error::CacheMiss(url.to_string()).into())
}
