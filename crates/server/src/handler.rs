//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::state::AppState;
use crate::tools::{CacheMatchParams, CachePurgeParams, PrecacheInstallParams, SwFetchParams, cache, precache, sw_fetch};

/// The main MCP server handler for workbox-mcp.
#[derive(Clone)]
pub struct WorkboxServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl WorkboxServer {
    /// Create a new server handler.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Set the precache manifest and install it: fetch new or changed entries and record the installed set. Items are URL strings or {url, revision} objects."
    )]
    async fn precache_install(&self, params: Parameters<PrecacheInstallParams>) -> Result<CallToolResult, McpError> {
        precache::install_impl(&self.state, params.0).await
    }

    #[tool(description = "Activate the installed precache: delete cached entries the installed record no longer references.")]
    async fn precache_activate(&self) -> Result<CallToolResult, McpError> {
        precache::activate_impl(&self.state).await
    }

    #[tool(description = "Show the current manifest, the installed record and stale precache entries.")]
    async fn precache_status(&self) -> Result<CallToolResult, McpError> {
        precache::status_impl(&self.state).await
    }

    #[tool(description = "Look up a cached response by URL in the precache or runtime cache.")]
    async fn cache_match(&self, params: Parameters<CacheMatchParams>) -> Result<CallToolResult, McpError> {
        cache::match_impl(&self.state, params.0).await
    }

    #[tool(description = "Purge a runtime cache, keeping the newest N entries or deleting it entirely.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        cache::purge_impl(&self.state, params.0).await
    }

    /// Dispatch a request through the route table.
    ///
    /// Precached URLs come from the precache; other GET requests go
    /// network-first through the runtime cache.
    #[tool(description = "Fetch a URL through the service worker routes: precache first for precached URLs, network-first otherwise.")]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        sw_fetch::fetch_impl(&self.state, params.0).await
    }
}

impl ServerHandler for WorkboxServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "workbox-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{MapFetcher, state};

    #[tokio::test]
    async fn test_all_tools_registered() {
        let server = WorkboxServer::new(state(MapFetcher::default()).await);
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["cache_match", "cache_purge", "precache_activate", "precache_install", "precache_status", "sw_fetch"]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = WorkboxServer::new(state(MapFetcher::default()).await);
        assert_eq!(server.get_info().server_info.name, "workbox-mcp");
    }
}
