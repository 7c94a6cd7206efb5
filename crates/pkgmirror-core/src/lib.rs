//! Core domain types and port definitions for pkgmirror.
//!
//! Pure data types and trait definitions — no I/O, no networking, no runtime
//! dependencies. Implementation crates (`pkgmirror-pacman`, `pkgmirror-apk`,
//! `pkgmirror-download`, `pkgmirror-cache`, `pkgmirror-router`) depend on this
//! crate, never the other way around.

pub mod domain;
pub mod error;
pub mod ports;

pub use domain::package::Package;
pub use domain::package_set::PackageSet;
pub use domain::repo_path::RepoPath;
pub use error::PkgError;
pub use ports::registry::{ImplementationFactory, ImplementationRegistry};
pub use ports::{DbDecoder, PackageCallback, PackageImpl};
