//! Pacman repository database decoding: gzip-wrapped tar of per-package
//! `<name>-<version>/desc` members.
//!
//! Grounded on `examples/original_source/impl/pacman/repository.go`.

use std::io::{BufRead, Read};

use flate2::read::GzDecoder;
use pkgmirror_core::error::PkgError;
use pkgmirror_core::ports::PackageCallback;
use tar::Archive;

use crate::package::from_filename;

/// Streams a pacman `.db` (or `.files`) archive, invoking `callback` once
/// per `desc` member decoded.
pub fn parse_db(reader: &mut dyn Read, callback: &mut PackageCallback<'_>) -> Result<(), PkgError> {
    let gz = GzDecoder::new(reader);
    let mut archive = Archive::new(gz);

    for entry in archive
        .entries()
        .map_err(|e| PkgError::io("<pacman db archive>", e))?
    {
        let mut entry = entry.map_err(|e| PkgError::io("<pacman db entry>", e))?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| PkgError::io("<pacman db entry path>", e))?;
        let is_desc = path.file_name().and_then(|n| n.to_str()) == Some("desc");
        if !is_desc {
            continue;
        }

        let mut buf = Vec::new();
        entry
            .read_to_end(&mut buf)
            .map_err(|e| PkgError::io("<pacman desc member>", e))?;

        let mut cursor = &buf[..];
        let mut first_line = String::new();
        read_line(&mut cursor, &mut first_line)?;
        if first_line != "%FILENAME%\n" {
            return Err(PkgError::InvalidFilename {
                filename: format!("invalid filename designator: {}", first_line.trim_end()),
            });
        }

        let mut filename_line = String::new();
        read_line(&mut cursor, &mut filename_line)?;
        let filename = filename_line.trim_end_matches('\n');

        let package = from_filename(filename)?;
        callback(package, cursor)?;
    }

    Ok(())
}

fn read_line(cursor: &mut &[u8], out: &mut String) -> Result<(), PkgError> {
    let n = cursor
        .read_line(out)
        .map_err(|e| PkgError::io("<pacman desc member>", e))?;
    if n == 0 {
        return Err(PkgError::InvalidFilename {
            filename: "unexpected end of desc member".to_string(),
        });
    }
    Ok(())
}
