//! URL resolution and normalization for caching and routing.

use regex::Regex;

/// Error type for URL handling failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("relative URL without a base: {0}")]
    RelativeWithoutBase(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a manifest or request URL against an optional base.
///
/// Absolute URLs are taken as-is; relative ones require `base`. The
/// result always has an http(s) scheme and no fragment.
pub fn resolve(base: Option<&url::Url>, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = match url::Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| UrlError::RelativeWithoutBase(trimmed.to_string()))?;
            base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
        }
        Err(e) => return Err(UrlError::InvalidUrl(e.to_string())),
    };

    finish(parsed)
}

fn finish(mut parsed: url::Url) -> Result<url::Url, UrlError> {
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &url::Url, b: &url::Url) -> bool {
    a.origin() == b.origin()
}

/// Drop query parameters whose name matches any of `patterns`.
///
/// Leaves the URL untouched when nothing matches, so an unrelated query
/// string keeps its original encoding.
pub fn strip_ignored_params(url: &url::Url, patterns: &[Regex]) -> url::Url {
    if patterns.is_empty() || url.query().is_none() {
        return url.clone();
    }

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let kept: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(name, _)| !patterns.iter().any(|p| p.is_match(name)))
        .collect();

    if kept.len() == pairs.len() {
        return url.clone();
    }

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    stripped
}
