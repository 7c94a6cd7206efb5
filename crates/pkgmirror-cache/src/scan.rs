//! Startup scan of the cache directory: classifies every file as a
//! repository database or a cached package, removes abandoned `.part`
//! files, and migrates flat-laid-out legacy packages into their proper
//! repo directory.
//!
//! Grounded on `init` in `examples/original_source/cache/cache.go` and on
//! `examples/original_source/cache/migrate.go`.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use pkgmirror_core::error::PkgError;
use pkgmirror_core::ports::PackageImpl;
use pkgmirror_core::{PackageSet, RepoPath};
use pkgmirror_router::Router;
use tracing::{info, warn};
use walkdir::WalkDir;

pub struct ScanResult {
    pub packets: HashMap<RepoPath, PackageSet>,
    pub repos: HashSet<RepoPath>,
}

/// Walks `cache_dir`, classifying every file by router match. Non-directory
/// read errors abort the scan; an individual file that doesn't parse is
/// logged and skipped.
pub fn scan(cache_dir: &Path, router: &Router) -> Result<ScanResult, PkgError> {
    let mut packets: HashMap<RepoPath, PackageSet> = HashMap::new();
    let mut repos: HashSet<RepoPath> = HashSet::new();
    let mut repo_impls: HashMap<RepoPath, Arc<dyn PackageImpl>> = HashMap::new();
    let mut migration_candidates: Vec<String> = Vec::new();

    for entry in WalkDir::new(cache_dir) {
        let entry = entry.map_err(|e| {
            PkgError::io(cache_dir.to_path_buf(), std::io::Error::other(e))
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        let rel = entry.path().strip_prefix(cache_dir).unwrap_or_else(|_| entry.path());
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        if rel_str.ends_with(".part") {
            std::fs::remove_file(entry.path()).map_err(|e| PkgError::io(entry.path().to_path_buf(), e))?;
            continue;
        }

        if rel.components().count() == 1 {
            migration_candidates.push(rel_str);
            continue;
        }

        let m = match router.match_path(&rel_str) {
            Ok(m) => m,
            Err(_) => {
                warn!(path = %rel_str, "no router match for cached file, ignoring");
                continue;
            }
        };

        repo_impls
            .entry(m.matched_path.clone())
            .or_insert_with(|| m.implementation.clone());

        let is_db = m.filename.as_deref() == Some(m.db_path().as_str());
        if is_db {
            repos.insert(m.matched_path.clone());
            continue;
        }

        match m.package() {
            Ok(p) => {
                packets
                    .entry(m.matched_path.clone())
                    .or_insert_with(PackageSet::new)
                    .insert(p);
            }
            Err(err) => {
                warn!(path = %rel_str, error = %err, "invalid package in cache directory, ignoring");
            }
        }
    }

    migrate(cache_dir, &migration_candidates, &repos, &repo_impls, &mut packets)?;

    Ok(ScanResult { packets, repos })
}

/// Relocates packages found loose at the cache root into the repo
/// directory whose database lists a same-size file of that name.
///
/// This only covers repositories whose implementation's `parse_db` surfaces
/// a size field in the callback's remaining buffer (pacman's `%CSIZE%`);
/// other implementations simply yield no match, which is logged and
/// otherwise harmless.
fn migrate(
    cache_dir: &Path,
    candidates: &[String],
    repos: &HashSet<RepoPath>,
    repo_impls: &HashMap<RepoPath, Arc<dyn PackageImpl>>,
    packets: &mut HashMap<RepoPath, PackageSet>,
) -> Result<(), PkgError> {
    if candidates.is_empty() {
        return Ok(());
    }
    info!(count = candidates.len(), "starting migration of flat-laid-out packages");

    let mut sizes: HashMap<String, u64> = HashMap::new();
    for filename in candidates {
        let path = cache_dir.join(filename);
        let meta = std::fs::metadata(&path).map_err(|e| PkgError::io(path.clone(), e))?;
        sizes.insert(filename.clone(), meta.len());
    }

    let mut found: HashMap<String, RepoPath> = HashMap::new();
    let mut discarded: HashSet<String> = HashSet::new();

    for repo_path in repos {
        let Some(implementation) = repo_impls.get(repo_path) else {
            continue;
        };
        let db_filename = implementation.db_file_name(repo_path.as_str());
        let db_path = repo_path.cache_dir(cache_dir).join(&db_filename);

        let mut file = match std::fs::File::open(&db_path) {
            Ok(f) => f,
            Err(err) => {
                warn!(path = %db_path.display(), error = %err, "could not open database during migration scan");
                continue;
            }
        };

        let mut callback = |p: Box<dyn pkgmirror_core::Package>, remaining: &[u8]| -> Result<(), PkgError> {
            let filename = p.filename();
            let Some(&expect_size) = sizes.get(&filename) else {
                return Ok(());
            };
            let Some(size) = find_csize(remaining) else {
                return Ok(());
            };
            if size != expect_size || discarded.contains(&filename) {
                return Ok(());
            }

            match found.get(&filename) {
                Some(existing) if existing != repo_path => {
                    warn!(filename, repo_a = %existing, repo_b = %repo_path, "double match during migration, discarding");
                    found.remove(&filename);
                    discarded.insert(filename);
                }
                Some(_) => {}
                None => {
                    found.insert(filename, repo_path.clone());
                }
            }
            Ok(())
        };

        if let Err(err) = implementation.parse_db(&mut file, &mut callback) {
            warn!(path = %db_path.display(), error = %err, "error parsing database during migration scan");
        }
    }

    for (filename, repo_path) in &found {
        sizes.remove(filename);

        let src = cache_dir.join(filename);
        let dest_dir = repo_path.cache_dir(cache_dir);
        std::fs::create_dir_all(&dest_dir).map_err(|e| PkgError::io(dest_dir.clone(), e))?;
        let dest = dest_dir.join(filename);
        std::fs::rename(&src, &dest).map_err(|e| PkgError::io(dest.clone(), e))?;

        let Some(implementation) = repo_impls.get(repo_path) else {
            continue;
        };
        match implementation.package_from_filename(filename) {
            Ok(pkg) => {
                packets.entry(repo_path.clone()).or_insert_with(PackageSet::new).insert(pkg);
            }
            Err(err) => {
                warn!(filename, error = %err, "migrated package does not parse, leaving uncatalogued");
            }
        }
    }

    for filename in sizes.keys() {
        warn!(filename, "no repository match found during migration");
    }

    info!("migration done");
    Ok(())
}

/// Scans a pacman `desc`-style remaining buffer for a `%CSIZE%` field.
fn find_csize(remaining: &[u8]) -> Option<u64> {
    let mut lines = remaining.split(|&b| b == b'\n');
    while let Some(line) = lines.next() {
        if line == b"%CSIZE%" {
            let size_line = lines.next()?;
            return std::str::from_utf8(size_line).ok()?.trim().parse().ok();
        }
    }
    None
}
