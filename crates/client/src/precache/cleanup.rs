//! Activate: delete what the installed record no longer references.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use workbox_core::Error;

use super::PrecacheController;

/// Outcome of an activate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CleanupReport {
    /// Cache keys removed from the current precache.
    pub deleted_keys: Vec<String>,
    /// Whole caches removed because they belong to an older precache layout.
    pub deleted_caches: Vec<String>,
    /// Keys or caches that could not be deleted.
    pub failed: Vec<String>,
}

impl PrecacheController {
    /// Delete stale precache entries.
    ///
    /// The installed record is read fresh on every call, so entries a later
    /// install added are never removed. Delete failures are logged and
    /// skipped.
    pub async fn activate(&self) -> Result<CleanupReport, Error> {
        let _lifecycle = self.lifecycle.lock().await;
        let cache_name = self.cache_name();
        let storage = &self.strategy.storage;

        let installed = self.installs.load_installed(cache_name).await?;
        self.serve(&installed)?;
        let referenced: HashSet<&str> = installed.iter().map(|entry| entry.cache_key.as_str()).collect();

        let mut report = CleanupReport::default();

        for key in storage.keys(cache_name).await? {
            if referenced.contains(key.as_str()) {
                continue;
            }
            match storage.delete(cache_name, &key).await {
                Ok(_) => report.deleted_keys.push(key),
                Err(e) => {
                    tracing::warn!(cache = cache_name, key = %key, error = %e, "failed to delete stale precache entry");
                    report.failed.push(key);
                }
            }
        }

        if self.options.cleanup_outdated_caches {
            for name in storage.cache_names().await? {
                if !self.options.cache_names.is_outdated_precache(&name, &self.options.cache_prefix) {
                    continue;
                }
                match storage.delete_cache(&name).await {
                    Ok(removed) => {
                        tracing::info!(cache = %name, entries = removed, "deleted outdated precache");
                        report.deleted_caches.push(name);
                    }
                    Err(e) => {
                        tracing::warn!(cache = %name, error = %e, "failed to delete outdated precache");
                        report.failed.push(name);
                    }
                }
            }
        }

        tracing::info!(
            cache = cache_name,
            deleted = report.deleted_keys.len(),
            deleted_caches = report.deleted_caches.len(),
            failed = report.failed.len(),
            "precache activate finished"
        );
        Ok(report)
    }
}
