//! Manifest against installed-record reconciliation.
//!
//! Pure set computation: no network or storage access happens here.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::manifest::{InstalledEntry, ManifestEntry};

/// Outcome of comparing the desired manifest with the installed record.
///
/// `to_install` and `to_keep` follow manifest order; `to_delete` is sorted by URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecacheDiff {
    /// New URLs, or known URLs whose cache key changed.
    pub to_install: Vec<ManifestEntry>,
    /// Entries whose URL and cache key both match the installed record.
    pub to_keep: Vec<ManifestEntry>,
    /// Installed entries whose URL no longer appears in the manifest.
    pub to_delete: Vec<InstalledEntry>,
}

impl PrecacheDiff {
    /// Compare `manifest` with `installed`, keyed by URL.
    pub fn compute(manifest: &[ManifestEntry], installed: &[InstalledEntry]) -> Self {
        let installed_by_url: BTreeMap<&str, &InstalledEntry> =
            installed.iter().map(|entry| (entry.url.as_str(), entry)).collect();
        let wanted: HashSet<&str> = manifest.iter().map(|entry| entry.url.as_str()).collect();

        let mut diff = PrecacheDiff::default();

        for entry in manifest {
            match installed_by_url.get(entry.url.as_str()) {
                Some(current) if current.cache_key == entry.cache_key => diff.to_keep.push(entry.clone()),
                _ => diff.to_install.push(entry.clone()),
            }
        }

        diff.to_delete = installed_by_url
            .into_iter()
            .filter(|(url, _)| !wanted.contains(url))
            .map(|(_, entry)| entry.clone())
            .collect();

        diff
    }

    /// Whether the installed record already matches the manifest.
    pub fn is_noop(&self) -> bool {
        self.to_install.is_empty() && self.to_delete.is_empty()
    }

    /// Move entries from `to_keep` to `to_install` when `is_missing` says so.
    ///
    /// Used when the cache lost a response the installed record still lists.
    /// Relative order within each list is preserved.
    pub fn reinstall_where(&mut self, mut is_missing: impl FnMut(&ManifestEntry) -> bool) -> usize {
        let (missing, present): (Vec<_>, Vec<_>) = std::mem::take(&mut self.to_keep).into_iter().partition(|e| is_missing(e));
        let moved = missing.len();
        self.to_keep = present;
        self.to_install.extend(missing);
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn entry(url: &str, revision: Option<&str>) -> ManifestEntry {
        ManifestEntry::new(url, revision.map(str::to_string))
    }

    fn installed(url: &str, revision: Option<&str>) -> InstalledEntry {
        InstalledEntry::from(&entry(url, revision))
    }

    #[test]
    fn test_first_run_installs_everything() {
        let manifest = vec![entry("a.js", Some("1")), entry("b.js", None)];
        let diff = PrecacheDiff::compute(&manifest, &[]);
        assert_eq!(diff.to_install, manifest);
        assert!(diff.to_keep.is_empty());
        assert!(diff.to_delete.is_empty());
    }

    #[test]
    fn test_idempotent_against_own_install() {
        let manifest = vec![entry("a.js", Some("1")), entry("b.js", None)];
        let record: Vec<InstalledEntry> = manifest.iter().map(InstalledEntry::from).collect();

        for _ in 0..2 {
            let diff = PrecacheDiff::compute(&manifest, &record);
            assert!(diff.to_install.is_empty());
            assert!(diff.to_delete.is_empty());
            assert!(diff.is_noop());
        }
    }

    #[test]
    fn test_install_and_keep_partition_manifest() {
        let manifest = vec![entry("a.js", Some("2")), entry("b.js", None), entry("c.js", Some("1"))];
        let record = vec![installed("a.js", Some("1")), installed("b.js", None), installed("z.js", None)];

        let diff = PrecacheDiff::compute(&manifest, &record);

        let install: BTreeSet<_> = diff.to_install.iter().map(|e| e.url.clone()).collect();
        let keep: BTreeSet<_> = diff.to_keep.iter().map(|e| e.url.clone()).collect();
        assert!(install.is_disjoint(&keep));
        assert_eq!(install.len() + keep.len(), manifest.len());
        for e in &manifest {
            assert!(install.contains(&e.url) ^ keep.contains(&e.url));
        }
    }

    #[test]
    fn test_revision_change_is_reinstall_not_delete() {
        let diff = PrecacheDiff::compute(&[entry("a.js", Some("2"))], &[installed("a.js", Some("1"))]);
        assert_eq!(diff.to_install, vec![entry("a.js", Some("2"))]);
        assert!(diff.to_delete.is_empty());
    }

    #[test]
    fn test_removed_url_is_deleted() {
        let diff = PrecacheDiff::compute(&[entry("a.js", None)], &[installed("a.js", None), installed("b.js", None)]);
        assert_eq!(diff.to_delete, vec![installed("b.js", None)]);
        assert_eq!(diff.to_keep, vec![entry("a.js", None)]);
    }

    #[test]
    fn test_order_independent_sets() {
        let manifest = vec![entry("a.js", None), entry("b.js", Some("1")), entry("c.js", None)];
        let record = vec![installed("c.js", None), installed("x.js", None), installed("b.js", Some("0")), installed("w.js", None)];

        let forward = PrecacheDiff::compute(&manifest, &record);

        let mut manifest_rev = manifest.clone();
        manifest_rev.reverse();
        let mut record_rev = record.clone();
        record_rev.reverse();
        let backward = PrecacheDiff::compute(&manifest_rev, &record_rev);

        let as_set = |v: &[ManifestEntry]| v.iter().cloned().collect::<BTreeSet<_>>();
        assert_eq!(as_set(&forward.to_install), as_set(&backward.to_install));
        assert_eq!(as_set(&forward.to_keep), as_set(&backward.to_keep));
        assert_eq!(forward.to_delete, backward.to_delete);
    }

    #[test]
    fn test_reinstall_where() {
        let manifest = vec![entry("a.js", None), entry("b.js", None)];
        let record: Vec<InstalledEntry> = manifest.iter().map(InstalledEntry::from).collect();
        let mut diff = PrecacheDiff::compute(&manifest, &record);

        let moved = diff.reinstall_where(|e| e.url == "b.js");

        assert_eq!(moved, 1);
        assert_eq!(diff.to_keep, vec![entry("a.js", None)]);
        assert_eq!(diff.to_install, vec![entry("b.js", None)]);
    }
}
