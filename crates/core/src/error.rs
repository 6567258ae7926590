//! Unified error types for workbox.
//!
//! Every variant carries a stable upper-case code in its display string so
//! log lines and tool responses can be grepped without string-matching the
//! free-form part of the message.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the precache and runtime caching pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A manifest entry is neither a non-empty URL string nor an object with a non-empty `url`.
    #[error("INVALID_MANIFEST_ENTRY: entry {index}: {reason}")]
    InvalidManifestEntry { index: usize, reason: String },

    /// Two manifest entries share a URL but disagree on the revision.
    #[error("DUPLICATE_ENTRY: {url} listed with revisions {first:?} and {second:?}")]
    DuplicateEntry { url: String, first: Option<String>, second: Option<String> },

    /// A fetched response was rejected by the cacheability policy.
    #[error("BAD_RESPONSE_STATUS: {url} returned status {status}")]
    BadResponseStatus { url: String, status: u16 },

    /// A response could not be written to cache storage.
    #[error("STORAGE_WRITE_FAILURE: {key}: {reason}")]
    StorageWriteFailure { key: String, reason: String },

    /// A cache entry could not be deleted.
    #[error("STORAGE_DELETE_FAILURE: {key}: {reason}")]
    StorageDeleteFailure { key: String, reason: String },

    /// A strategy finished without producing a response.
    #[error("NO_RESPONSE: {url}")]
    NoResponse { url: String },

    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network failure before a response was received.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) | Error::InvalidManifestEntry { .. } | Error::DuplicateEntry { .. } => -32602,
            Error::NoResponse { .. } => -32000,
            Error::CacheMiss(_) => -32001,
            Error::Database(_)
            | Error::MigrationFailed(_)
            | Error::StorageWriteFailure { .. }
            | Error::StorageDeleteFailure { .. } => -32002,
            Error::InvalidUrl(_) => -32003,
            Error::BadResponseStatus { .. } => -32004,
            Error::Network(_) => -32005,
            Error::FetchTimeout(_) => -32006,
            Error::FetchTooLarge(_) => -32007,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::BadResponseStatus { url: "/app.js".to_string(), status: 404 };
        assert!(err.to_string().starts_with("BAD_RESPONSE_STATUS"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::CacheMiss("/index.html".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32001);

        let err = Error::DuplicateEntry { url: "a.js".into(), first: Some("1".into()), second: Some("2".into()) };
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32602);
    }
}
