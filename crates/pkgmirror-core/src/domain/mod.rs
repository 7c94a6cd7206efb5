//! Pure domain types: package identity, package sets, repository paths.

pub mod package;
pub mod package_set;
pub mod repo_path;
