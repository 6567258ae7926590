//! sw_fetch tool implementation.
//!
//! Dispatches a request through the route table the way a service worker
//! fetch handler would, passing unrouted requests straight to the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use workbox_client::fetch::resolve;
use workbox_client::{Fetcher, Lifetime, Method, Request};
use workbox_core::Error;

use crate::state::AppState;
use crate::tools::cache::get::ResponseSummary;
use crate::tools::json_result;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// URL to request, absolute or relative to the configured base URL.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Treat the request as a top-level navigation.
    #[serde(default)]
    pub navigate: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// Whether a route or default handler answered, rather than a plain network pass-through.
    pub routed: bool,
    pub response: ResponseSummary,
}

/// Implementation of the sw_fetch tool.
///
/// Background work started by the handler (cache refreshes) is awaited
/// before the tool returns.
pub async fn fetch_impl(state: &AppState, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let url = resolve(state.precache.options().base_url.as_ref(), &params.url)
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = Method::from_bytes(params.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("invalid method: {}", params.method)))?;

    let request = (if params.navigate { Request::navigate(url) } else { Request::get(url) }).with_method(method);
    let lifetime = Lifetime::new();

    let (routed, result) = match state.router.handle_request(&request, &lifetime).await {
        Some(result) => (true, result),
        None => {
            tracing::debug!(url = %request.url, "no handler, passing through to network");
            (false, state.fetcher.fetch(&request).await)
        }
    };

    lifetime.settled().await;

    let response = result?;
    json_result(&SwFetchOutput { routed, response: response.into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use workbox_core::CacheStorage;

    use crate::state::testing::{MapFetcher, state, state_with};
    use crate::tools::output_of;

    const PAGE: &str = "https://example.com/page";

    fn params(url: &str, method: &str) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: method.into(), navigate: false }
    }

    #[tokio::test]
    async fn test_runtime_requests_go_network_first() {
        let state = state(MapFetcher::with(&[(PAGE, 200, "hello")])).await;

        let output: SwFetchOutput = output_of(&fetch_impl(&state, params("/page", "GET")).await.unwrap());

        assert!(output.routed);
        assert_eq!(output.response.body, "hello");
        assert!(state.db.lookup("workbox-runtime", PAGE).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_runtime_cache_used_when_offline() {
        let fetcher = Arc::new(MapFetcher::with(&[(PAGE, 200, "hello")]));
        let state = state_with(fetcher.clone()).await;
        fetch_impl(&state, params(PAGE, "GET")).await.unwrap();
        fetcher.responses.lock().unwrap().clear();

        let output: SwFetchOutput = output_of(&fetch_impl(&state, params(PAGE, "GET")).await.unwrap());
        assert_eq!(output.response.body, "hello");
    }

    #[tokio::test]
    async fn test_precached_url_served_from_precache() {
        let state = state(MapFetcher::with(&[("https://example.com/index.html", 200, "shell")])).await;
        state.precache.set_manifest_json(&[serde_json::json!({"url": "/index.html", "revision": "1"})]).unwrap();
        state.precache.install().await.unwrap();

        let output: SwFetchOutput = output_of(&fetch_impl(&state, params("/", "GET")).await.unwrap());
        assert_eq!(output.response.body, "shell");
        assert!(state.db.keys("workbox-runtime").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unrouted_method_passes_through() {
        let state = state(MapFetcher::with(&[(PAGE, 201, "created")])).await;

        let output: SwFetchOutput = output_of(&fetch_impl(&state, params(PAGE, "post")).await.unwrap());
        assert!(!output.routed);
        assert_eq!(output.response.status, 201);
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let state = state(MapFetcher::default()).await;
        let err = fetch_impl(&state, params(PAGE, "GE T")).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
