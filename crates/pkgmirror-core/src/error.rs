//! Error kinds shared across every pkgmirror crate.
//!
//! One variant per row of the error table in spec.md §7; adapters match on
//! these to decide HTTP status codes, the download manager and cache
//! registry are the primary producers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PkgError {
    /// The router could not map the request path to any configured repository.
    #[error("no router match for path {path}")]
    NoMatch { path: String },

    /// The file name does not parse under the matched implementation's
    /// filename grammar. Callers use this as a sentinel to fall back to
    /// database-file interpretation.
    #[error("{filename} does not parse as a package filename")]
    InvalidFilename { filename: String },

    /// The client asked for a version older than one already cached.
    #[error("newer version of {name} already cached ({cached} > {requested})")]
    NewerVersionAvailable {
        name: String,
        cached: String,
        requested: String,
    },

    /// Every configured upstream for a repository failed to connect or
    /// returned neither 200 nor 304.
    #[error("no upstream mirror available for {path}")]
    NoMirrorAvailable { path: String },

    /// A transfer ended with fewer bytes than the declared `Content-Length`.
    #[error("short read on {path}: got {got} of {want} bytes")]
    ShortRead { path: PathBuf, got: u64, want: u64 },

    /// `AddRepo` called for a repository already registered. Callers treat
    /// this as a benign no-op, not a failure.
    #[error("repository {path} already available")]
    RepoAlreadyAvailable { path: String },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PkgError {
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
