//! The `PackageImpl` port: the seam every distribution-specific crate
//! (`pkgmirror-pacman`, `pkgmirror-apk`) implements and everything else in
//! the workspace programs against.

pub mod registry;

use std::cmp::Ordering;
use std::io::Read;

use crate::domain::package::Package;
use crate::error::PkgError;

/// Invoked once per database record decoded by [`PackageImpl::parse_db`].
/// `remaining` is whatever bytes followed the parsed filename line in that
/// record — callers that need extra fields (e.g. `%CSIZE%` for migration)
/// scan it themselves.
pub type PackageCallback<'a> = dyn FnMut(Box<dyn Package>, &[u8]) -> Result<(), PkgError> + 'a;

/// A distribution's package-manager semantics: version ordering, filename
/// parsing, and repository database decoding.
///
/// Implementations are stateless and `Send + Sync` so a single boxed
/// instance can be shared across the registry and every request.
pub trait PackageImpl: Send + Sync {
    /// Short identifying name, e.g. `"pacman"` or `"apk"`. Matches the
    /// `implementation` field in router configuration.
    fn name(&self) -> &str;

    /// Total order on this implementation's version strings.
    fn compare_versions(&self, a: &str, b: &str) -> Ordering;

    /// Parses a package filename into its identity. Fails with
    /// [`PkgError::InvalidFilename`] when `filename` does not match this
    /// implementation's grammar.
    fn package_from_filename(&self, filename: &str) -> Result<Box<dyn Package>, PkgError>;

    /// Streams a repository index, invoking `callback` once per package
    /// record it decodes.
    fn parse_db(&self, reader: &mut dyn Read, callback: &mut PackageCallback<'_>) -> Result<(), PkgError>;

    /// The database file's path relative to the repository directory, e.g.
    /// `"core.db"` or `"APKINDEX.tar.gz"`.
    fn db_file_name(&self, repo_path: &str) -> String;
}

/// Convenience alias used by callers that only care about the decoding
/// trait object, distinct from the full `PackageImpl` bundle (kept as a
/// type alias rather than a separate trait since every implementation
/// decodes its own DB format itself).
pub type DbDecoder = dyn PackageImpl;
