//! Cache name composition.

/// Marker shared by every precache name, current and historical.
pub const PRECACHE_MARKER: &str = "-precache-";

/// Cache names for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    precache: String,
    runtime: String,
}

impl CacheNames {
    /// Compose names as `<prefix>-<kind>-<scope>[-<suffix>]`, skipping empty parts.
    pub fn new(prefix: &str, scope: &str, suffix: Option<&str>) -> Self {
        Self { precache: compose(prefix, "precache-v2", scope, suffix), runtime: compose(prefix, "runtime", scope, suffix) }
    }

    pub fn precache(&self) -> &str {
        &self.precache
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    /// Whether `name` is a precache from another layout or scope version.
    ///
    /// Only names sharing the current prefix are considered, so caches owned
    /// by unrelated code are never touched.
    pub fn is_outdated_precache(&self, name: &str, prefix: &str) -> bool {
        name != self.precache && name.starts_with(prefix) && name.contains(PRECACHE_MARKER)
    }
}

impl Default for CacheNames {
    fn default() -> Self {
        Self::new("workbox", "", None)
    }
}

fn compose(prefix: &str, kind: &str, scope: &str, suffix: Option<&str>) -> String {
    [Some(prefix), Some(kind), Some(scope), suffix]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let names = CacheNames::default();
        assert_eq!(names.precache(), "workbox-precache-v2");
        assert_eq!(names.runtime(), "workbox-runtime");
    }

    #[test]
    fn test_names_with_scope_and_suffix() {
        let names = CacheNames::new("app", "https://example.com/", Some("v3"));
        assert_eq!(names.precache(), "app-precache-v2-https://example.com/-v3");
        assert_eq!(names.runtime(), "app-runtime-https://example.com/-v3");
    }

    #[test]
    fn test_outdated_precache_detection() {
        let names = CacheNames::default();
        assert!(names.is_outdated_precache("workbox-precache-https://example.com/", "workbox"));
        assert!(!names.is_outdated_precache("workbox-precache-v2", "workbox"));
        assert!(!names.is_outdated_precache("workbox-runtime", "workbox"));
        assert!(!names.is_outdated_precache("other-precache-v1", "workbox"));
    }
}
