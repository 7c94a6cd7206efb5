//! apk package identity: `<name>-<version>.apk`.
//!
//! Grounded on `examples/original_source/impl/apk/packet.go`, which matches
//! `^(.+)-(.+-.+)\.apk$` — the version itself must contain at least one
//! dash (apk versions are always `<upstream>-r<rel>`).

use pkgmirror_core::{Package, PkgError};

#[derive(Debug, Clone)]
pub struct ApkPackage {
    name: String,
    version: String,
}

impl ApkPackage {
    pub fn new(name: String, version: String) -> Self {
        Self { name, version }
    }
}

impl Package for ApkPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn filename(&self) -> String {
        format!("{}-{}.apk", self.name, self.version)
    }

    fn clone_box(&self) -> Box<dyn Package> {
        Box::new(self.clone())
    }
}

/// Parses an apk package filename. `name` is everything up to the last
/// dash that still leaves a `<x>-<y>` pair in the remainder, matching the
/// original's `(.+)-(.+-.+)\.apk` greedy capture order.
pub fn from_filename(filename: &str) -> Result<Box<dyn Package>, PkgError> {
    let Some(stem) = filename.strip_suffix(".apk") else {
        return Err(PkgError::InvalidFilename {
            filename: filename.to_string(),
        });
    };

    // Greedy `(.+)-(.+-.+)` matching: `name` eats as much as possible while
    // `version` still contains an internal dash, i.e. `version` is always
    // exactly the last two dash-delimited fields.
    let mut parts: Vec<&str> = stem.rsplitn(3, '-').collect();
    if parts.len() != 3 {
        return Err(PkgError::InvalidFilename {
            filename: filename.to_string(),
        });
    }
    parts.reverse();
    let name = parts[0];
    let version = format!("{}-{}", parts[1], parts[2]);
    if name.is_empty() {
        return Err(PkgError::InvalidFilename {
            filename: filename.to_string(),
        });
    }

    Ok(Box::new(ApkPackage {
        name: name.to_string(),
        version,
    }))
}
