//! Route table: dispatches requests to strategies.
//!
//! Routes are scanned in registration order and the first whose method and
//! matcher accept the request handles it. Unmatched requests go to the
//! default handler registered for their method, if any; otherwise the
//! router declines and the caller passes the request through to the network.

mod route;

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Method;
use url::Url;
use workbox_core::{Error, Response};

use crate::fetch::{Request, same_origin};
use crate::lifetime::Lifetime;
use crate::strategies::Strategy;

pub use route::{MatchContext, Matcher, NavigationMatcher, RegexMatcher, Route};

/// Ordered set of routes plus fallback handlers.
#[derive(Debug, Default)]
pub struct Router {
    origin: Option<Url>,
    routes: Vec<Route>,
    default_handlers: HashMap<Method, Arc<dyn Strategy>>,
    catch_handler: Option<Arc<dyn Strategy>>,
}

impl Router {
    /// A router for requests made from `origin`.
    pub fn new(origin: Option<Url>) -> Self {
        Self { origin, ..Default::default() }
    }

    pub fn register_route(&mut self, route: Route) {
        tracing::debug!(method = %route.method(), handler = route.handler().name(), "registered route");
        self.routes.push(route);
    }

    /// Handler for requests no route matched.
    pub fn set_default_handler(&mut self, handler: Arc<dyn Strategy>, method: Method) {
        self.default_handlers.insert(method, handler);
    }

    /// Handler used when the selected handler fails.
    pub fn set_catch_handler(&mut self, handler: Arc<dyn Strategy>) {
        self.catch_handler = Some(handler);
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// First route accepting `request`.
    pub fn find_route(&self, request: &Request) -> Option<&Route> {
        let ctx = MatchContext {
            request,
            origin: self.origin.as_ref(),
            same_origin: self.origin.as_ref().is_some_and(|origin| same_origin(origin, &request.url)),
        };
        self.routes.iter().find(|route| route.matches(&ctx))
    }

    /// Dispatch `request`.
    ///
    /// Returns `None` when neither a route nor a default handler applies.
    /// Handler errors go to the catch handler when one is set.
    pub async fn handle_request(&self, request: &Request, lifetime: &Lifetime) -> Option<Result<Response, Error>> {
        if !matches!(request.url.scheme(), "http" | "https") {
            tracing::debug!(url = %request.url, "router ignores non-http request");
            return None;
        }

        let handler = match self.find_route(request) {
            Some(route) => route.handler().clone(),
            None => match self.default_handlers.get(&request.method) {
                Some(handler) => handler.clone(),
                None => {
                    tracing::debug!(url = %request.url, "no route matched");
                    return None;
                }
            },
        };

        tracing::debug!(url = %request.url, handler = handler.name(), "routing request");

        let result = match handler.handle(request, lifetime).await {
            Ok(response) => Ok(response),
            Err(e) => match &self.catch_handler {
                Some(catch) => {
                    tracing::warn!(url = %request.url, handler = handler.name(), error = %e, "handler failed, using catch handler");
                    catch.handle(request, lifetime).await
                }
                None => Err(e),
            },
        };
        Some(result)
    }
}
