//! Install: diff, fetch, store, record.

use std::collections::{HashMap, HashSet};

use futures::StreamExt;
use futures::stream;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use workbox_core::{Error, InstallPolicy, InstalledEntry, ManifestEntry, PrecacheDiff};

use super::PrecacheController;
use crate::fetch::{Request, reload_headers};
use crate::strategies::Cacheability;

/// An entry that could not be fetched or stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FailedEntry {
    pub url: String,
    pub error: String,
}

/// Outcome of an install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    /// URLs fetched and stored by this install.
    pub updated: Vec<String>,
    /// URLs already installed at the right revision.
    pub not_updated: Vec<String>,
    /// Kept entries refetched because their response was missing from the cache.
    pub repaired: usize,
    /// Entries skipped under the best-effort policy.
    pub failed: Vec<FailedEntry>,
}

impl PrecacheController {
    /// Bring the precache in line with the manifest.
    ///
    /// The installed record is written once, after every fetch has
    /// settled. Under `AllOrNothing` any failure leaves the record
    /// untouched and returns the first failure in manifest order; with
    /// rollback enabled the responses this attempt wrote are deleted again.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _lifecycle = self.lifecycle.lock().await;
        let manifest = self.manifest()?;
        let cache_name = self.cache_name();
        let installed = self.installs.load_installed(cache_name).await?;

        let mut diff = PrecacheDiff::compute(&manifest, &installed);

        let present: HashSet<String> = self.strategy.storage.keys(cache_name).await?.into_iter().collect();
        let repaired = diff.reinstall_where(|entry| !present.contains(&entry.cache_key));
        if repaired > 0 {
            tracing::warn!(cache = cache_name, count = repaired, "installed entries missing from cache, refetching");
        }

        tracing::info!(
            cache = cache_name,
            to_install = diff.to_install.len(),
            to_keep = diff.to_keep.len(),
            to_delete = diff.to_delete.len(),
            "precache install starting"
        );

        let order: HashMap<&str, usize> = manifest.iter().enumerate().map(|(i, e)| (e.url.as_str(), i)).collect();

        let outcomes: Vec<(ManifestEntry, Result<(), Error>)> = stream::iter(diff.to_install.iter().cloned())
            .map(|entry| async move {
                let result = self.populate(&entry).await;
                (entry, result)
            })
            .buffer_unordered(self.options.install_concurrency.max(1))
            .collect()
            .await;

        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for (entry, result) in outcomes {
            match result {
                Ok(()) => succeeded.push(entry),
                Err(e) => {
                    tracing::warn!(cache = cache_name, url = %entry.url, error = %e, "precache entry failed");
                    failures.push((entry, e));
                }
            }
        }
        let position = |entry: &ManifestEntry| order.get(entry.url.as_str()).copied().unwrap_or(usize::MAX);
        succeeded.sort_by_key(|entry| position(entry));
        failures.sort_by_key(|(entry, _)| position(entry));

        if !failures.is_empty() && self.options.install_policy == InstallPolicy::AllOrNothing {
            if self.options.rollback_failed_install {
                self.roll_back(&succeeded).await;
            }
            tracing::warn!(
                cache = cache_name,
                failed = failures.len(),
                "precache install aborted, installed record unchanged"
            );
            let (_, first) = failures.remove(0);
            return Err(first);
        }

        let record = self.next_record(&manifest, &diff, &succeeded, &failures, &installed);
        self.installs.save_installed(cache_name, &record).await?;
        self.serve(&record)?;

        let report = InstallReport {
            updated: succeeded.iter().map(|e| e.url.clone()).collect(),
            not_updated: diff.to_keep.iter().map(|e| e.url.clone()).collect(),
            repaired,
            failed: failures
                .iter()
                .map(|(entry, e)| FailedEntry { url: entry.url.clone(), error: e.to_string() })
                .collect(),
        };

        tracing::info!(
            cache = cache_name,
            updated = report.updated.len(),
            not_updated = report.not_updated.len(),
            failed = report.failed.len(),
            "precache install finished"
        );
        Ok(report)
    }

    /// Fetch one entry by URL and store it under its cache key.
    async fn populate(&self, entry: &ManifestEntry) -> Result<(), Error> {
        let url = url::Url::parse(&entry.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", entry.url)))?;
        let mut request = Request::get(url);
        request.headers = reload_headers();

        let response = self.strategy.fetch(&request).await?;
        let status = response.status;

        let Some(response) = self.strategy.cacheable(&request, response, Cacheability::OkOrOpaque).await else {
            return Err(Error::BadResponseStatus { url: entry.url.clone(), status });
        };
        let response = if response.redirected { response.without_redirect() } else { response };

        self.strategy.put_key(&request, &entry.cache_key, &response).await?;
        tracing::debug!(url = %entry.url, key = %entry.cache_key, status, "precached");
        Ok(())
    }

    async fn roll_back(&self, written: &[ManifestEntry]) {
        for entry in written {
            if let Err(e) = self.strategy.storage.delete(self.cache_name(), &entry.cache_key).await {
                tracing::warn!(key = %entry.cache_key, error = %e, "failed to roll back precache write");
            }
        }
        if !written.is_empty() {
            tracing::debug!(cache = self.cache_name(), count = written.len(), "rolled back precache writes");
        }
    }

    /// Record to persist after an install that is not aborted.
    ///
    /// With no failures this is the whole manifest. Under best effort a
    /// failed entry falls back to whatever was installed for its URL before.
    fn next_record(
        &self, manifest: &[ManifestEntry], diff: &PrecacheDiff, succeeded: &[ManifestEntry],
        failures: &[(ManifestEntry, Error)], installed: &[InstalledEntry],
    ) -> Vec<InstalledEntry> {
        if failures.is_empty() {
            return manifest.iter().map(InstalledEntry::from).collect();
        }

        let failed: HashSet<&str> = failures.iter().map(|(entry, _)| entry.url.as_str()).collect();
        let mut record: Vec<InstalledEntry> =
            diff.to_keep.iter().chain(succeeded.iter()).map(InstalledEntry::from).collect();
        record.extend(installed.iter().filter(|entry| failed.contains(entry.url.as_str())).cloned());
        record.sort();
        record
    }
}
