//! The cache registry: in-memory index of cached packages and repository
//! databases, backed by `cache_dir` on disk.
//!
//! Grounded on `examples/original_source/cache/cache.go` and
//! `examples/original_source/cache/repocache.go`. Lock ordering is
//! registry lock (`packets`) before repo lock (`repos`); no operation here
//! holds both at once.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use pkgmirror_core::error::PkgError;
use pkgmirror_core::ports::PackageImpl;
use pkgmirror_core::{Package, PackageSet, RepoPath};
use pkgmirror_download::{DownloadError, DownloadManager, DownloadReader};
use pkgmirror_router::Router;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

use crate::scan;

struct RepoState {
    known: HashSet<RepoPath>,
}

/// In-memory cache index plus the machinery to populate and keep it fresh.
///
/// Meant to be held behind an `Arc` — several operations spawn detached
/// tasks that need a `'static` handle back to the registry.
pub struct CacheRegistry {
    cache_dir: PathBuf,
    router: Arc<Router>,
    downloads: Arc<DownloadManager>,
    packets: Mutex<HashMap<RepoPath, PackageSet>>,
    repos: Mutex<RepoState>,
}

impl CacheRegistry {
    /// Builds a registry from a startup scan of `cache_dir`. Blocking:
    /// callers running inside a Tokio runtime should wrap this in
    /// `spawn_blocking`.
    pub fn new(cache_dir: PathBuf, router: Arc<Router>, downloads: Arc<DownloadManager>) -> Result<Self, PkgError> {
        std::fs::create_dir_all(&cache_dir).map_err(|e| PkgError::io(cache_dir.clone(), e))?;
        let scanned = scan::scan(&cache_dir, &router)?;
        Ok(Self {
            cache_dir,
            router,
            downloads,
            packets: Mutex::new(scanned.packets),
            repos: Mutex::new(RepoState { known: scanned.repos }),
        })
    }

    /// Serves a package from cache, downloading it if necessary. Kicks off
    /// `AddRepo` for the owning repository in the background so its
    /// database ends up cached too.
    pub async fn get_packet(self: &Arc<Self>, request_path: &str) -> Result<DownloadReader, PkgError> {
        let m = self.router.match_path(request_path)?;
        let p = m.package()?;

        self.reject_if_obsolete(&m.matched_path, &m.implementation, p.as_ref()).await?;

        let dest = self.cache_dir.join(m.matched_path.as_str()).join(p.filename());
        let (tx, rx) = oneshot::channel();
        let (reader, is_new) = self
            .downloads
            .get_file(dest, &m.upstream_urls, Some(tx), false)
            .await
            .map_err(map_download_err)?;

        if is_new {
            let this = self.clone();
            let repo_path = m.matched_path.clone();
            let implementation = m.implementation.clone();
            let pkg = p.clone();
            tokio::spawn(async move {
                match rx.await {
                    Ok(Ok(())) => this.finalize(&repo_path, &implementation, pkg).await,
                    Ok(Err(err)) => warn!(repo = %repo_path, error = %err, "package download failed"),
                    Err(_) => {}
                }
            });
        }

        let this = self.clone();
        let repo_path = m.matched_path.clone();
        tokio::spawn(async move {
            match this.add_repo(&repo_path).await {
                Ok(()) | Err(PkgError::RepoAlreadyAvailable { .. }) => {}
                Err(err) => warn!(repo = %repo_path, error = %err, "could not ensure repository database"),
            }
        });

        Ok(reader)
    }

    /// Synchronous pre-warm variant used by `HEAD ?bg`: downloads and
    /// finalizes the package before returning, swallowing errors.
    pub async fn add_packet(self: &Arc<Self>, request_path: &str) {
        if let Err(err) = self.add_packet_inner(request_path).await {
            warn!(path = request_path, error = %err, "background pre-warm failed");
        }
    }

    async fn add_packet_inner(self: &Arc<Self>, request_path: &str) -> Result<(), PkgError> {
        let m = self.router.match_path(request_path)?;
        let p = m.package()?;

        self.reject_if_obsolete(&m.matched_path, &m.implementation, p.as_ref()).await?;

        let dest = self.cache_dir.join(m.matched_path.as_str()).join(p.filename());
        self.downloads
            .background_download(dest, &m.upstream_urls)
            .await
            .map_err(map_download_err)?;

        self.finalize(&m.matched_path, &m.implementation, p).await;
        Ok(())
    }

    async fn reject_if_obsolete(
        &self,
        repo_path: &RepoPath,
        implementation: &Arc<dyn PackageImpl>,
        p: &dyn Package,
    ) -> Result<(), PkgError> {
        let packets = self.packets.lock().await;
        let Some(set) = packets.get(repo_path) else {
            return Ok(());
        };
        for other in set.find_other_versions(p) {
            if implementation.compare_versions(other.version(), p.version()) == Ordering::Greater {
                return Err(PkgError::NewerVersionAvailable {
                    name: p.name().to_string(),
                    cached: other.version().to_string(),
                    requested: p.version().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Garbage-collects strictly-older same-name versions, inserts `p`,
    /// and logs its availability. Runs under the registry lock.
    async fn finalize(&self, repo_path: &RepoPath, implementation: &Arc<dyn PackageImpl>, p: Box<dyn Package>) {
        let mut packets = self.packets.lock().await;
        let set = packets.entry(repo_path.clone()).or_insert_with(PackageSet::new);

        let stale: Vec<String> = set
            .find_other_versions(p.as_ref())
            .into_iter()
            .filter(|q| implementation.compare_versions(q.version(), p.version()) == Ordering::Less)
            .map(Package::filename)
            .collect();

        for filename in &stale {
            let path = repo_path.cache_dir(&self.cache_dir).join(filename);
            if let Err(err) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %err, "failed to remove stale package during finalize");
            }
            set.delete(filename);
        }

        info!(repo = %repo_path, filename = p.filename(), "package now available");
        set.insert(p);
    }

    /// Idempotently ensures `repo_path`'s database is cached.
    pub async fn add_repo(self: &Arc<Self>, repo_path: &RepoPath) -> Result<(), PkgError> {
        {
            let repos = self.repos.lock().await;
            if repos.known.contains(repo_path) {
                return Err(PkgError::RepoAlreadyAvailable {
                    path: repo_path.to_string(),
                });
            }
        }

        info!(repo = %repo_path, "downloading repository database");
        match self.download_repo(repo_path).await {
            Ok(()) => {
                info!(repo = %repo_path, "repository now available");
                Ok(())
            }
            Err(err) => {
                warn!(repo = %repo_path, error = %err, "error downloading repository database");
                Err(err)
            }
        }
    }

    /// Downloads `repo_path`'s database with a conditional GET and, on
    /// success, adds it to the known-repos set. Relies on the download
    /// manager's own path-keyed deduplication rather than a second
    /// per-repo lock to avoid redundant concurrent transfers.
    pub async fn download_repo(&self, repo_path: &RepoPath) -> Result<(), PkgError> {
        let repo_match = self.router.match_path(repo_path.as_str())?;
        let db_file_name = repo_match.db_path();
        let db_request_path = format!("{repo_path}/{db_file_name}");
        let db_match = self.router.match_path(&db_request_path)?;

        let dest = self.cache_dir.join(repo_path.as_str()).join(&db_file_name);

        let (tx, rx) = oneshot::channel();
        let (_reader, is_new) = self
            .downloads
            .get_file(dest, &db_match.upstream_urls, Some(tx), true)
            .await
            .map_err(map_download_err)?;

        if is_new {
            match rx.await {
                Ok(result) => result.map_err(map_download_err)?,
                Err(_) => {
                    return Err(PkgError::NoMirrorAvailable {
                        path: repo_path.to_string(),
                    })
                }
            }
        }

        let mut repos = self.repos.lock().await;
        repos.known.insert(repo_path.clone());
        Ok(())
    }

    /// Parses the cached database for `repo_path` and queues any remotely
    /// newer packages for background download, cascading old-version
    /// removal through `finalize`.
    pub async fn update_packets(self: &Arc<Self>, repo_path: &RepoPath) {
        let m = match self.router.match_path(repo_path.as_str()) {
            Ok(m) => m,
            Err(err) => {
                warn!(repo = %repo_path, error = %err, "could not resolve repository for update");
                return;
            }
        };

        let db_path = self.cache_dir.join(repo_path.as_str()).join(m.db_path());
        let mut file = match std::fs::File::open(&db_path) {
            Ok(f) => f,
            Err(err) => {
                warn!(path = %db_path.display(), error = %err, "could not open cached database");
                return;
            }
        };

        let mut to_download: Vec<Box<dyn Package>> = Vec::new();
        {
            let packets = self.packets.lock().await;
            let set = packets.get(repo_path);
            let mut callback = |p: Box<dyn Package>, _remaining: &[u8]| -> Result<(), PkgError> {
                if let Some(set) = set {
                    let is_newer = set
                        .find_other_versions(p.as_ref())
                        .into_iter()
                        .any(|other| m.implementation.compare_versions(p.version(), other.version()) == Ordering::Greater);
                    if is_newer {
                        to_download.push(p);
                    }
                }
                Ok(())
            };

            if let Err(err) = m.implementation.parse_db(&mut file, &mut callback) {
                warn!(path = %db_path.display(), error = %err, "error parsing database file");
                return;
            }
        }

        for p in to_download {
            let file_path = format!("{repo_path}/{}", p.filename());
            let pm = match self.router.match_path(&file_path) {
                Ok(pm) => pm,
                Err(err) => {
                    warn!(path = file_path, error = %err, "could not resolve upstream for updated package");
                    continue;
                }
            };

            let dest = self.cache_dir.join(repo_path.as_str()).join(p.filename());
            match self.downloads.background_download(dest, &pm.upstream_urls).await {
                Ok(()) => self.finalize(repo_path, &m.implementation, p).await,
                Err(err) => warn!(path = file_path, error = %err, "failed to download updated package"),
            }
        }

        info!(repo = %repo_path, "all cached packages up to date");
    }

    /// Snapshots known repositories and refreshes each in the background.
    /// Sends the last error encountered (or `None`) to `result` exactly
    /// once, swallowing per-repo errors so one bad mirror doesn't abort
    /// the rest of the sweep.
    pub async fn update_databases(self: &Arc<Self>, result: Option<oneshot::Sender<Option<anyhow::Error>>>) {
        let to_update: Vec<RepoPath> = {
            let repos = self.repos.lock().await;
            repos.known.iter().cloned().collect()
        };

        let this = self.clone();
        tokio::spawn(async move {
            let mut last_err: Option<anyhow::Error> = None;
            for repo in to_update {
                info!(repo = %repo, "updating repository database");
                match this.download_repo(&repo).await {
                    Ok(()) => {
                        let this = this.clone();
                        let repo = repo.clone();
                        tokio::spawn(async move { this.update_packets(&repo).await });
                    }
                    Err(err) => {
                        warn!(repo = %repo, error = %err, "error updating database");
                        last_err = Some(anyhow::anyhow!(err));
                    }
                }
            }

            if last_err.is_none() {
                info!("all databases updated successfully");
            } else {
                warn!("error(s) occurred during database updates");
            }

            if let Some(tx) = result {
                let _ = tx.send(last_err);
            }
        });
    }

    /// Opens the cached database file for `repo_path` along with its
    /// modification time. Fails if the repository isn't known yet.
    pub async fn get_db_file(&self, repo_path: &RepoPath) -> Result<(DownloadReader, SystemTime), PkgError> {
        {
            let repos = self.repos.lock().await;
            if !repos.known.contains(repo_path) {
                return Err(PkgError::NoMatch {
                    path: repo_path.to_string(),
                });
            }
        }

        let m = self.router.match_path(repo_path.as_str())?;
        let path = self.cache_dir.join(repo_path.as_str()).join(m.db_path());

        let file = tokio::fs::File::open(&path).await.map_err(|e| PkgError::io(path.clone(), e))?;
        let modified = file
            .metadata()
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| PkgError::io(path.clone(), e))?;
        let std_file = file.into_std().await;

        Ok((DownloadReader::Static(std_file), modified))
    }
}

/// Loops forever, refreshing every known database every 20 minutes and
/// waiting for each sweep to finish before scheduling the next tick.
pub async fn periodic_refresh(registry: Arc<CacheRegistry>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(20 * 60));
    interval.tick().await; // first tick fires immediately; skip it, scan already ran at startup
    loop {
        interval.tick().await;
        let (tx, rx) = oneshot::channel();
        registry.update_databases(Some(tx)).await;
        match rx.await {
            Ok(Some(err)) => warn!(error = %err, "periodic database refresh finished with errors"),
            Ok(None) => info!("periodic database refresh finished"),
            Err(_) => {}
        }
    }
}

fn map_download_err(err: DownloadError) -> PkgError {
    match err {
        DownloadError::NoMirrorAvailable { path } => PkgError::NoMirrorAvailable {
            path: path.display().to_string(),
        },
        DownloadError::ShortRead { path, got, want } => PkgError::ShortRead { path, got, want },
        DownloadError::Io { path, source } => PkgError::Io { path, source },
        DownloadError::Upstream(err) => PkgError::Io {
            path: PathBuf::new(),
            source: std::io::Error::other(err),
        },
    }
}
