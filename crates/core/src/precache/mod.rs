//! Precache manifest handling.
//!
//! The manifest loader turns raw build output into normalized entries and
//! the diff engine compares them with what the last install recorded.
//! Fetching and storing lives in the client crate.

pub mod diff;
pub mod manifest;

pub use diff::PrecacheDiff;
pub use manifest::{
    InstalledEntry, ManifestEntry, REVISION_PARAM, RawEntry, compute_cache_key, load_manifest, parse_manifest,
};
