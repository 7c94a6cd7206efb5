//! apk repository index decoding: gzip-wrapped tar containing a single
//! member named exactly `APKINDEX`, itself a sequence of blank-line
//! delimited `key:value` records.
//!
//! Grounded on `examples/original_source/impl/apk/database.go`.

use std::io::{BufRead, BufReader, Read};

use flate2::read::GzDecoder;
use pkgmirror_core::error::PkgError;
use pkgmirror_core::ports::PackageCallback;
use tar::Archive;

use crate::package::ApkPackage;
use pkgmirror_core::Package;

/// Streams an `APKINDEX.tar.gz`, invoking `callback` once per package
/// record found in the `APKINDEX` member.
pub fn parse_db(reader: &mut dyn Read, callback: &mut PackageCallback<'_>) -> Result<(), PkgError> {
    let gz = GzDecoder::new(reader);
    let mut archive = Archive::new(gz);
    let mut found_index = false;

    for entry in archive
        .entries()
        .map_err(|e| PkgError::io("<apk index archive>", e))?
    {
        let entry = entry.map_err(|e| PkgError::io("<apk index entry>", e))?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| PkgError::io("<apk index entry path>", e))?;
        if path.as_os_str() != "APKINDEX" {
            continue;
        }
        found_index = true;

        let mut buf = BufReader::new(entry);
        loop {
            match parse_record(&mut buf)? {
                Some((name, version)) => {
                    let package: Box<dyn Package> = Box::new(ApkPackage::new(name, version));
                    callback(package, &[])?;
                }
                None => break,
            }
        }
    }

    if !found_index {
        return Err(PkgError::InvalidFilename {
            filename: "missing APKINDEX in APKINDEX.tar.gz".to_string(),
        });
    }

    Ok(())
}

/// Parses one blank-line-delimited record. Returns `None` at end of
/// stream, `Err` if a record ends without both `P:` and `V:` present.
fn parse_record(r: &mut impl BufRead) -> Result<Option<(String, String)>, PkgError> {
    let mut name = None;
    let mut version = None;
    let mut saw_any_line = false;

    loop {
        let mut line = String::new();
        let n = r
            .read_line(&mut line)
            .map_err(|e| PkgError::io("<APKINDEX record>", e))?;
        if n == 0 {
            if !saw_any_line {
                return Ok(None);
            }
            break;
        }
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            break;
        }
        saw_any_line = true;
        if let Some(rest) = line.strip_prefix("P:") {
            name = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("V:") {
            version = Some(rest.to_string());
        }
    }

    match (name, version) {
        (Some(name), Some(version)) => Ok(Some((name, version))),
        _ => Err(PkgError::InvalidFilename {
            filename: "missing name or version from APKINDEX".to_string(),
        }),
    }
}
