//! Stored HTTP response representation.
//!
//! This is the value type that flows between the network collaborator, the
//! cache storage collaborator and the strategies. It is deliberately plain
//! data so it can be written to SQLite and serialized for tool output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Status used for opaque (cross-origin, no-cors) responses.
pub const OPAQUE_STATUS: u16 = 0;

/// An HTTP response as seen by the cache layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// URL the response was ultimately served from.
    pub url: String,
    /// HTTP status code, `0` for opaque responses.
    pub status: u16,
    /// Response headers with lowercased names.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
    /// Whether the response was produced by following a redirect.
    #[serde(default)]
    pub redirected: bool,
}

impl Response {
    /// Build a response with no headers.
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { url: url.into(), status, headers: BTreeMap::new(), body: body.into(), redirected: false }
    }

    /// Build an opaque response.
    pub fn opaque(url: impl Into<String>) -> Self {
        Self::new(url, OPAQUE_STATUS, Vec::new())
    }

    /// Add a header, lowercasing its name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_opaque(&self) -> bool {
        self.status == OPAQUE_STATUS
    }

    /// Copy of this response with `redirected` cleared.
    ///
    /// Redirected responses must not be served for navigations, so precached
    /// copies are stored as if they came straight from their final URL.
    pub fn without_redirect(&self) -> Self {
        Self { redirected: false, ..self.clone() }
    }
}
