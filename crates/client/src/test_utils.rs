//! In-crate collaborators for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use workbox_core::{CacheDb, CacheStorage, Error, Response};

use crate::fetch::{Fetcher, Request};

pub fn request(url: &str) -> Request {
    Request::get(url::Url::parse(url).unwrap())
}

#[derive(Clone)]
enum Reply {
    Respond(Response),
    Fail,
}

/// Scripted fetcher. Unknown URLs get a 404.
#[derive(Default)]
pub struct StubFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Respond(Response::new(url, status, body)));
    }

    pub fn respond_with(&self, url: &str, response: Response) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Respond(response));
    }

    pub fn fail(&self, url: &str) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Fail);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == url).count()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().get(&url).cloned();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail) => Err(Error::Network(format!("{url}: connection refused"))),
            None => Ok(Response::new(url, 404, "not found")),
        }
    }
}

/// Wraps a `CacheDb`, failing writes and deletes for keys containing a marker.
pub struct FlakyStorage {
    pub inner: CacheDb,
    pub fail_put: Option<String>,
    pub fail_delete: Option<String>,
}

impl FlakyStorage {
    pub fn new(inner: CacheDb) -> Self {
        Self { inner, fail_put: None, fail_delete: None }
    }
}

fn hits(marker: &Option<String>, key: &str) -> bool {
    marker.as_deref().is_some_and(|m| key.contains(m))
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn put(&self, cache_name: &str, key: &str, response: &Response) -> Result<(), Error> {
        if hits(&self.fail_put, key) {
            return Err(Error::StorageWriteFailure { key: key.to_string(), reason: "quota exceeded".into() });
        }
        self.inner.put(cache_name, key, response).await
    }

    async fn lookup(&self, cache_name: &str, key: &str) -> Result<Option<Response>, Error> {
        self.inner.lookup(cache_name, key).await
    }

    async fn delete(&self, cache_name: &str, key: &str) -> Result<bool, Error> {
        if hits(&self.fail_delete, key) {
            return Err(Error::StorageDeleteFailure { key: key.to_string(), reason: "locked".into() });
        }
        self.inner.delete(cache_name, key).await
    }

    async fn keys(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        self.inner.keys(cache_name).await
    }

    async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.inner.cache_names().await
    }

    async fn delete_cache(&self, cache_name: &str) -> Result<u64, Error> {
        self.inner.delete_cache(cache_name).await
    }
}
