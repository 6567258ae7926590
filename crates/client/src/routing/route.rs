//! Routes and request matchers.

use std::sync::Arc;

use regex::Regex;
use reqwest::Method;
use url::Url;

use crate::fetch::{Request, RequestMode};
use crate::strategies::Strategy;

/// What a matcher gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub request: &'a Request,
    /// Origin the router serves, if known.
    pub origin: Option<&'a Url>,
    /// Whether the request URL shares `origin`.
    pub same_origin: bool,
}

/// Predicate deciding whether a route handles a request.
pub trait Matcher: Send + Sync {
    fn matches(&self, ctx: &MatchContext<'_>) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&MatchContext<'_>) -> bool + Send + Sync,
{
    fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        self(ctx)
    }
}

/// Matches the full request URL against a regex.
///
/// Cross-origin requests only match when the regex matches from the very
/// start of the URL, so a pattern like `\.js$` never captures third-party
/// scripts by accident.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        let url = ctx.request.url.as_str();
        match self.regex.find(url) {
            Some(_) if ctx.same_origin => true,
            Some(m) if m.start() == 0 => true,
            Some(_) => {
                tracing::debug!(url, pattern = %self.regex, "cross-origin request only matched mid-URL");
                false
            }
            None => false,
        }
    }
}

/// Matches navigation requests, filtered by path+query allow and deny lists.
#[derive(Debug, Clone, Default)]
pub struct NavigationMatcher {
    allowlist: Vec<Regex>,
    denylist: Vec<Regex>,
}

impl NavigationMatcher {
    /// Every navigation matches.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, regex: Regex) -> Self {
        self.allowlist.push(regex);
        self
    }

    pub fn deny(mut self, regex: Regex) -> Self {
        self.denylist.push(regex);
        self
    }
}

impl Matcher for NavigationMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        if ctx.request.mode != RequestMode::Navigate {
            return false;
        }

        let url = &ctx.request.url;
        let path_and_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        if self.denylist.iter().any(|re| re.is_match(&path_and_query)) {
            tracing::debug!(path = %path_and_query, "navigation denied");
            return false;
        }
        self.allowlist.is_empty() || self.allowlist.iter().any(|re| re.is_match(&path_and_query))
    }
}

/// A matcher bound to the strategy that serves what it matches.
pub struct Route {
    matcher: Box<dyn Matcher>,
    handler: Arc<dyn Strategy>,
    method: Method,
}

impl Route {
    /// A GET route.
    pub fn new(matcher: impl Matcher + 'static, handler: Arc<dyn Strategy>) -> Self {
        Self { matcher: Box::new(matcher), handler, method: Method::GET }
    }

    pub fn regex(regex: Regex, handler: Arc<dyn Strategy>) -> Self {
        Self::new(RegexMatcher::new(regex), handler)
    }

    pub fn navigation(matcher: NavigationMatcher, handler: Arc<dyn Strategy>) -> Self {
        Self::new(matcher, handler)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn handler(&self) -> &Arc<dyn Strategy> {
        &self.handler
    }

    pub fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        ctx.request.method == self.method && self.matcher.matches(ctx)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route").field("method", &self.method).field("handler", &self.handler.name()).finish()
    }
}
