//! Manifest loading and cache key derivation.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// Query parameter carrying the revision in a cache key.
pub const REVISION_PARAM: &str = "__WB_REVISION__";

/// A manifest item as written by the build: a bare URL or a URL with a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawEntry {
    /// URL that already encodes its content hash.
    Url(String),
    /// URL with an explicit revision.
    Revisioned {
        url: String,
        #[serde(default)]
        revision: Option<String>,
    },
}

impl RawEntry {
    /// Interpret an arbitrary JSON value as a manifest item.
    ///
    /// `index` is only used for error reporting.
    pub fn from_value(index: usize, value: &Value) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidManifestEntry { index, reason: reason.to_string() };

        match value {
            Value::String(url) => Ok(RawEntry::Url(url.clone())),
            Value::Object(map) => {
                let url = match map.get("url") {
                    Some(Value::String(url)) => url.clone(),
                    Some(_) => return Err(invalid("`url` must be a string")),
                    None => return Err(invalid("object is missing `url`")),
                };
                let revision = match map.get("revision") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(revision)) => Some(revision.clone()),
                    Some(_) => return Err(invalid("`revision` must be a string or null")),
                };
                Ok(RawEntry::Revisioned { url, revision })
            }
            _ => Err(invalid("expected a URL string or an object with `url`")),
        }
    }

    fn parts(&self) -> (&str, Option<&str>) {
        match self {
            RawEntry::Url(url) => (url, None),
            RawEntry::Revisioned { url, revision } => (url, revision.as_deref().filter(|r| !r.is_empty())),
        }
    }
}

/// A normalized manifest entry: the desired state for one URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ManifestEntry {
    /// URL fetched from the network.
    pub url: String,
    /// Opaque version tag, `None` when the URL is content-addressed.
    pub revision: Option<String>,
    /// Key the response is stored under.
    pub cache_key: String,
}

impl ManifestEntry {
    pub fn new(url: impl Into<String>, revision: Option<String>) -> Self {
        let url = url.into();
        let cache_key = compute_cache_key(&url, revision.as_deref());
        Self { url, revision, cache_key }
    }
}

/// A persisted record of an entry that was fetched and stored successfully.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct InstalledEntry {
    pub url: String,
    pub revision: Option<String>,
    pub cache_key: String,
}

impl From<&ManifestEntry> for InstalledEntry {
    fn from(entry: &ManifestEntry) -> Self {
        Self { url: entry.url.clone(), revision: entry.revision.clone(), cache_key: entry.cache_key.clone() }
    }
}

/// Derive the cache key for `url` at `revision`.
///
/// Without a revision the URL is its own key. Otherwise the revision is
/// appended as a query parameter, ahead of any fragment, so each revision
/// of a URL gets a distinct key while the fetch URL stays untouched.
pub fn compute_cache_key(url: &str, revision: Option<&str>) -> String {
    let Some(revision) = revision else {
        return url.to_string();
    };

    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let separator = if base.contains('?') { '&' } else { '?' };
    let encoded: String = url::form_urlencoded::byte_serialize(revision.as_bytes()).collect();

    let mut key = format!("{base}{separator}{REVISION_PARAM}={encoded}");
    if let Some(fragment) = fragment {
        key.push('#');
        key.push_str(fragment);
    }
    key
}

/// Normalize raw manifest items into entries, preserving order.
///
/// Identical repeats are collapsed. The same URL with two different
/// revisions, or two URLs that collide on a cache key, is a
/// configuration error.
pub fn load_manifest(raw: &[RawEntry]) -> Result<Vec<ManifestEntry>, Error> {
    let mut entries: Vec<ManifestEntry> = Vec::with_capacity(raw.len());
    let mut by_url: HashMap<String, usize> = HashMap::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for (index, item) in raw.iter().enumerate() {
        let (url, revision) = item.parts();
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidManifestEntry { index, reason: "url must not be empty".into() });
        }

        let entry = ManifestEntry::new(url, revision.map(str::to_string));

        if let Some(&existing) = by_url.get(&entry.url) {
            let existing = &entries[existing];
            if existing.revision == entry.revision {
                tracing::debug!(url = %entry.url, "ignoring repeated manifest entry");
                continue;
            }
            return Err(Error::DuplicateEntry {
                url: entry.url,
                first: existing.revision.clone(),
                second: entry.revision,
            });
        }

        if let Some(&existing) = by_key.get(&entry.cache_key) {
            return Err(Error::DuplicateEntry {
                url: entries[existing].url.clone(),
                first: entries[existing].revision.clone(),
                second: entry.revision,
            });
        }

        by_url.insert(entry.url.clone(), entries.len());
        by_key.insert(entry.cache_key.clone(), entries.len());
        entries.push(entry);
    }

    Ok(entries)
}

/// Parse and normalize a manifest given as JSON values.
pub fn parse_manifest(values: &[Value]) -> Result<Vec<ManifestEntry>, Error> {
    let raw = values
        .iter()
        .enumerate()
        .map(|(index, value)| RawEntry::from_value(index, value))
        .collect::<Result<Vec<_>, _>>()?;
    load_manifest(&raw)
}
