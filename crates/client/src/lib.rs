//! Runtime side of workbox.
//!
//! This crate provides the network collaborator, caching strategies and
//! their plugins, the route table, and the precache controller that
//! installs and activates manifests on top of the core storage types.

pub mod fetch;
pub mod lifetime;
pub mod plugins;
pub mod precache;
pub mod routing;
pub mod strategies;

#[cfg(test)]
mod test_utils;

pub use reqwest::Method;

pub use fetch::{FetchClient, FetchConfig, Fetcher, Request, RequestMode};
pub use lifetime::Lifetime;
pub use plugins::{CacheableResponsePlugin, ExpirationPlugin, Hook, Plugin, Plugins};
pub use precache::{CleanupReport, InstallReport, PrecacheController, PrecacheOptions};
pub use routing::{NavigationMatcher, RegexMatcher, Route, Router};
pub use strategies::{
    CacheFirst, CacheOnly, Cacheability, NetworkFirst, NetworkOnly, StaleWhileRevalidate, Strategy, StrategyOptions,
};
