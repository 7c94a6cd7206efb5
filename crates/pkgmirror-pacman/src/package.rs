//! Pacman package identity: `<name>-<version>-<release>-<arch>.pkg.tar.<xz|zst>`.
//!
//! Grounded on `examples/original_source/impl/pacman/packet.go`, which
//! matches the filename with the regex
//! `(.+)-(.+-.+)-(.+)\.pkg\.tar\.(xz|zst)`. We parse the same grammar by
//! hand from the back of the string instead of pulling in `regex`, since
//! the grammar is a fixed small number of dash-delimited fields.

use pkgmirror_core::{Package, PkgError};

#[derive(Debug, Clone)]
pub struct PacmanPackage {
    name: String,
    version: String,
    arch: String,
    compression: &'static str,
}

impl Package for PacmanPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn filename(&self) -> String {
        format!(
            "{}-{}-{}.pkg.tar.{}",
            self.name, self.version, self.arch, self.compression
        )
    }

    fn clone_box(&self) -> Box<dyn Package> {
        Box::new(self.clone())
    }
}

/// Parses a pacman package filename. The grammar (from the back) is
/// `<compression> , <arch> , <epoch:version-release> , <name>`, where
/// `name` and `version` may themselves contain dashes — only the trailing
/// `-<arch>.pkg.tar.<xz|zst>` and the leading `<name>-` before a
/// `<ver>-<rel>` pair are unambiguous, matching the original's greedy
/// `(.+)-(.+-.+)-(.+)` capture order.
pub fn from_filename(filename: &str) -> Result<Box<dyn Package>, PkgError> {
    let compression = if filename.ends_with(".pkg.tar.xz") {
        "xz"
    } else if filename.ends_with(".pkg.tar.zst") {
        "zst"
    } else {
        return Err(PkgError::InvalidFilename {
            filename: filename.to_string(),
        });
    };

    let stem = filename
        .strip_suffix(&format!(".pkg.tar.{compression}"))
        .expect("suffix already matched above");

    // stem = name-version-release-arch ; version-release is itself
    // dash-joined, so split from the right: arch is the last field, then
    // release, then everything else is name-version (name itself may
    // contain dashes, version may not contain additional ambiguous
    // dashes beyond epoch:version-release which is handled opaquely).
    let mut parts: Vec<&str> = stem.rsplitn(3, '-').collect();
    if parts.len() != 3 {
        return Err(PkgError::InvalidFilename {
            filename: filename.to_string(),
        });
    }
    parts.reverse();
    let arch = parts[2];
    let release = parts[1];
    let name_and_version = parts[0];

    let Some((name, version_prefix)) = name_and_version.rsplit_once('-') else {
        return Err(PkgError::InvalidFilename {
            filename: filename.to_string(),
        });
    };

    if name.is_empty() || version_prefix.is_empty() || release.is_empty() || arch.is_empty() {
        return Err(PkgError::InvalidFilename {
            filename: filename.to_string(),
        });
    }

    let version = format!("{version_prefix}-{release}");

    Ok(Box::new(PacmanPackage {
        name: name.to_string(),
        version,
        arch: arch.to_string(),
        compression,
    }))
}
