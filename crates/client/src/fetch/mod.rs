//! Network collaborator: requests, the `Fetcher` seam and a reqwest client.
//!
//! ### Requests
//! - `Request` carries method, URL, headers and a request mode; routing
//!   uses the mode to recognise navigations.
//!
//! ### Responses
//! - Non-2xx statuses are returned as responses, not errors; deciding
//!   whether a status is acceptable belongs to the caller.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod url;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};

pub use self::url::{UrlError, resolve, same_origin, strip_ignored_params};

use workbox_core::{AppConfig, Error, Response};

/// How a request was initiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMode {
    /// Top-level document navigation.
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    /// Cross-origin request whose response is opaque.
    NoCors,
}

/// An outgoing or intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub mode: RequestMode,
}

impl Request {
    /// A plain GET request.
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, headers: HeaderMap::new(), mode: RequestMode::default() }
    }

    /// A navigation request for a document.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "ignoring invalid request header"),
        }
        self
    }

    /// URL used as the runtime cache key.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

/// Anything that can turn a request into a response over the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request.
    ///
    /// Fails only when no response was received at all; error statuses
    /// come back as `Ok`.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "workbox/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "workbox/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(format!("{}: {}", request.url, e))
                } else {
                    Error::Network(format!("{}: {}", request.url, e))
                }
            })?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = collect_headers(response.headers());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} ({}) in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            fetch_ms,
            bytes.len()
        );

        Ok(Response {
            redirected: final_url != request.url,
            url: final_url.to_string(),
            status: status.as_u16(),
            headers,
            body: bytes.to_vec(),
        })
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

/// Header telling intermediaries to revalidate, used for precache fetches.
pub fn reload_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "workbox/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "test/1".into(), max_bytes: 10, timeout_ms: 500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "test/1");
        assert_eq!(config.max_bytes, 10);
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_request_builders() {
        let url = Url::parse("https://example.com/").unwrap();
        let request = Request::navigate(url.clone()).with_header("Accept", "text/html");
        assert_eq!(request.mode, RequestMode::Navigate);
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.headers.get("accept").unwrap(), "text/html");
        assert_eq!(request.cache_key(), "https://example.com/");

        let request = Request::get(url).with_method(Method::POST).with_header("bad header", "x");
        assert_eq!(request.method, Method::POST);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_reload_headers() {
        let headers = reload_headers();
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-cache");
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }
}
