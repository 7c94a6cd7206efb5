//! Repository key: the slash-normalized path segment identifying a
//! repository within the cache (e.g. `"core/os/x86_64"`).
//!
//! Grounded on the router/cache key handling in
//! `examples/original_source/database/router.go` and `cache/cache.go`, where
//! repository identity is a cleaned, slash-joined path with no leading or
//! trailing slash and no empty segments.

use std::fmt;
use std::path::Path;

/// A normalized repository path, used as the map key for everything the
/// cache registry tracks per-repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoPath(String);

impl RepoPath {
    /// Builds a `RepoPath` from an arbitrary string, normalizing away
    /// leading/trailing slashes, duplicate slashes, and `.` segments.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw
            .as_ref()
            .split('/')
            .filter(|seg| !seg.is_empty() && *seg != ".")
            .collect::<Vec<_>>()
            .join("/");
        Self(normalized)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The on-disk directory this repository's packages are cached under,
    /// relative to the cache root.
    #[must_use]
    pub fn cache_dir(&self, cache_root: &Path) -> std::path::PathBuf {
        cache_root.join(&self.0)
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepoPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for RepoPath {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}
