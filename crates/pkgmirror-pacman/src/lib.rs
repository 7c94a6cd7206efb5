//! The pacman `PackageImpl`: RPM-style version comparison, `.pkg.tar.{xz,zst}`
//! filename parsing, and gzip+tar `desc`-database decoding.

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

pub use package::from_filename;
pub use version::compare_versions;

/// The pacman package-manager implementation. Parameterized per-match by
/// the router's resolved `reponame` arg, since a request path's repo name
/// cannot reliably be inferred from path position (the canonical
/// `$repo/os/$arch` layout does not have it last).
#[derive(Debug, Clone)]
pub struct Pacman {
    reponame: String,
}

impl PackageImpl for Pacman {
    fn name(&self) -> &str {
        "pacman"
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
        format!("{}.db", self.reponame)
    }
}

/// Registers the pacman implementation under the name `"pacman"`.
///
/// # Panics
/// The factory panics if matched without a `reponame` arg, mirroring the
/// original's `newPacmanImpl`: a repository template using this
/// implementation must supply `args: {reponame: ...}` in configuration.
/// This is a configuration error caught on first match, not a condition a
/// request can trigger.
pub fn register(registry: &mut ImplementationRegistry) {
    registry.register("pacman", |args| {
        let reponame = args.get("reponame").expect("pacman implementation requires a \"reponame\" arg");
        Arc::new(Pacman {
            reponame: reponame.clone(),
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn db_file_name_uses_resolved_reponame_not_path_position() {
        let mut registry = ImplementationRegistry::new();
        register(&mut registry);

        let args = HashMap::from([("reponame".to_string(), "core".to_string())]);
        let pacman = registry.get("pacman", &args).expect("pacman registered");
        // The canonical `$repo/os/$arch` layout puts the repo name first,
        // not last, so the db file must come from the resolved arg.
        assert_eq!(pacman.db_file_name("core/os/x86_64"), "core.db");
    }

    #[test]
    #[should_panic(expected = "reponame")]
    fn register_panics_without_reponame_arg() {
        let mut registry = ImplementationRegistry::new();
        register(&mut registry);
        let _ = registry.get("pacman", &HashMap::new());
    }
}
