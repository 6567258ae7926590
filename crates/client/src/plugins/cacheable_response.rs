//! Cacheability rules based on status codes and headers.

use std::collections::BTreeMap;

use async_trait::async_trait;
use workbox_core::{Error, Response};

use super::{Hook, Plugin};
use crate::fetch::Request;

/// Only lets responses into the cache when they match configured statuses and/or headers.
///
/// When both are configured a response must satisfy both.
#[derive(Debug, Clone)]
pub struct CacheableResponsePlugin {
    statuses: Vec<u16>,
    headers: BTreeMap<String, String>,
}

impl CacheableResponsePlugin {
    /// At least one of `statuses` or `headers` must be non-empty.
    pub fn new(statuses: Vec<u16>, headers: BTreeMap<String, String>) -> Result<Self, Error> {
        if statuses.is_empty() && headers.is_empty() {
            return Err(Error::InvalidInput(
                "cacheable response rules need at least one status or header".to_string(),
            ));
        }
        let headers = headers.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
        Ok(Self { statuses, headers })
    }

    /// Shorthand for a status-only rule.
    pub fn statuses(statuses: impl Into<Vec<u16>>) -> Result<Self, Error> {
        Self::new(statuses.into(), BTreeMap::new())
    }

    pub fn is_cacheable(&self, response: &Response) -> bool {
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&response.status);
        let headers_ok = self.headers.iter().all(|(name, value)| response.header(name) == Some(value.as_str()));
        status_ok && headers_ok
    }
}

#[async_trait]
impl Plugin for CacheableResponsePlugin {
    fn name(&self) -> &str {
        "cacheable-response"
    }

    fn hooks(&self) -> &'static [Hook] {
        &[Hook::CacheWillUpdate]
    }

    async fn cache_will_update(&self, _request: &Request, response: Response) -> Option<Response> {
        if self.is_cacheable(&response) { Some(response) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_a_rule() {
        assert!(CacheableResponsePlugin::new(Vec::new(), BTreeMap::new()).is_err());
    }

    #[test]
    fn test_status_rule() {
        let plugin = CacheableResponsePlugin::statuses([0, 200]).unwrap();
        assert!(plugin.is_cacheable(&Response::opaque("https://cdn.example.com/x")));
        assert!(plugin.is_cacheable(&Response::new("/a", 200, "")));
        assert!(!plugin.is_cacheable(&Response::new("/a", 404, "")));
    }

    #[test]
    fn test_header_rule_is_case_insensitive_on_name() {
        let headers = BTreeMap::from([("X-Is-Cacheable".to_string(), "true".to_string())]);
        let plugin = CacheableResponsePlugin::new(vec![200], headers).unwrap();

        let yes = Response::new("/a", 200, "").with_header("x-is-cacheable", "true");
        let no_header = Response::new("/a", 200, "");
        let wrong_status = Response::new("/a", 500, "").with_header("x-is-cacheable", "true");

        assert!(plugin.is_cacheable(&yes));
        assert!(!plugin.is_cacheable(&no_header));
        assert!(!plugin.is_cacheable(&wrong_status));
    }
}
