//! The apk `PackageImpl`: apk-tools-style version comparison, `.apk`
//! filename parsing, and gzip+tar `APKINDEX` decoding.

mod database;
mod package;
mod version;

use std::cmp::Ordering;
use std::io::Read;
use std::sync::Arc;

use pkgmirror_core::error::PkgError;
use pkgmirror_core::ports::registry::ImplementationRegistry;
use pkgmirror_core::ports::{PackageCallback, PackageImpl};
use pkgmirror_core::Package;

pub use package::{from_filename, ApkPackage};
pub use version::compare_versions;

/// The apk package-manager implementation.
#[derive(Debug, Default)]
pub struct Apk;

impl PackageImpl for Apk {
    fn name(&self) -> &str {
        "apk"
    }

    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        version::compare_versions(a, b)
    }

    fn package_from_filename(&self, filename: &str) -> Result<Box<dyn Package>, PkgError> {
        package::from_filename(filename)
    }

    fn parse_db(&self, reader: &mut dyn Read, callback: &mut PackageCallback<'_>) -> Result<(), PkgError> {
        database::parse_db(reader, callback)
    }

    fn db_file_name(&self, _repo_path: &str) -> String {
        "APKINDEX.tar.gz".to_string()
    }
}

/// Registers the apk implementation under the name `"apk"`. Unlike pacman,
/// apk's database path doesn't depend on the matched repo name, so it
/// ignores the resolved args.
pub fn register(registry: &mut ImplementationRegistry) {
    registry.register("apk", |_args| Arc::new(Apk));
}
