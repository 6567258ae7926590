//! workbox-mcp server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use workbox_client::{FetchClient, FetchConfig};
use workbox_core::{AppConfig, CacheDb};

mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(db = %config.db_path.display(), "Starting workbox-mcp server on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let state = Arc::new(state::AppState::new(config, db, fetcher)?);
    let installed = state.precache.reload_installed().await?;
    tracing::info!(entries = installed, "serving installed precache");

    let handler = handler::WorkboxServer::new(state);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
