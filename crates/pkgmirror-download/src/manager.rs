//! The download manager: deduplicates concurrent demand for the same
//! destination path and serves a live, seekable stream while the transfer
//! is still running in the background.
//!
//! Grounded on `examples/original_source/cache/downloadmanager/download.go`.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use tokio::fs as tokio_fs;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::errors::DownloadError;
use crate::reader::LiveReader;

/// Either a live stream over an in-progress transfer, or a plain handle to
/// an already-complete file.
pub enum DownloadReader {
    Live(LiveReader),
    Static(std::fs::File),
}

impl Read for DownloadReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Live(r) => r.read(buf),
            Self::Static(f) => f.read(buf),
        }
    }
}

impl Seek for DownloadReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            Self::Live(r) => r.seek(pos),
            Self::Static(f) => f.seek(pos),
        }
    }
}

struct OngoingDownload {
    part_path: PathBuf,
    final_path: PathBuf,
    total_size: u64,
    written: Arc<AtomicU64>,
    server_mtime: Option<std::time::SystemTime>,
}

/// Signaled exactly once when a transfer this manager started completes.
pub type CompletionSignal = oneshot::Sender<Result<(), DownloadError>>;

/// Coordinates downloads to local cache paths, deduplicating concurrent
/// requests for the same destination and serializing background
/// (pre-warm) transfers behind a single global permit.
pub struct DownloadManager {
    client: Client,
    ongoing: Arc<Mutex<HashMap<PathBuf, Arc<OngoingDownload>>>>,
    background_permit: Mutex<()>,
}

impl DownloadManager {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            ongoing: Arc::new(Mutex::new(HashMap::new())),
            background_permit: Mutex::new(()),
        }
    }

    /// Returns a reader for `path`, downloading from the first responsive
    /// URL in `urls` if it isn't already cached or in progress.
    ///
    /// `is_new` in the returned tuple is `true` iff this call started a
    /// fresh background transfer; in that case `completion` (if given)
    /// fires exactly once when that transfer finishes.
    pub async fn get_file(
        &self,
        path: PathBuf,
        urls: &[String],
        completion: Option<CompletionSignal>,
        force_redownload: bool,
    ) -> Result<(DownloadReader, bool), DownloadError> {
        {
            let ongoing = self.ongoing.lock().await;
            if let Some(dl) = ongoing.get(&path) {
                let reader = LiveReader::open(&dl.part_path, dl.total_size, dl.written.clone())?;
                return Ok((DownloadReader::Live(reader), false));
            }
        }

        let existing_mtime = tokio_fs::metadata(&path).await.ok().and_then(|m| m.modified().ok());
        if existing_mtime.is_some() && !force_redownload {
            let file = std::fs::File::open(&path).map_err(|e| DownloadError::io(path.clone(), e))?;
            return Ok((DownloadReader::Static(file), false));
        }

        for (i, url) in urls.iter().enumerate() {
            let mut request = self.client.get(url);
            if let Some(mtime) = existing_mtime {
                request = request.header("If-Modified-Since", httpdate::fmt_http_date(mtime).as_str());
            }

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    warn!(url, error = %err, "upstream mirror unreachable");
                    continue;
                }
            };

            if response.status() == StatusCode::NOT_MODIFIED {
                let file = std::fs::File::open(&path).map_err(|e| DownloadError::io(path.clone(), e))?;
                return Ok((DownloadReader::Static(file), false));
            }

            if !response.status().is_success() {
                debug!(url, status = %response.status(), "mirror returned non-success status");
                continue;
            }

            let total_size = response.content_length().unwrap_or(0);
            let server_mtime = response
                .headers()
                .get(reqwest::header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| httpdate::parse_http_date(v).ok());
            let part_path = part_path_for(&path);

            if let Some(parent) = part_path.parent() {
                tokio_fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DownloadError::io(parent.to_path_buf(), e))?;
            }

            let written = Arc::new(AtomicU64::new(0));
            let dl = Arc::new(OngoingDownload {
                part_path: part_path.clone(),
                final_path: path.clone(),
                total_size,
                written: written.clone(),
                server_mtime,
            });

            {
                let mut ongoing = self.ongoing.lock().await;
                ongoing.insert(path.clone(), dl.clone());
            }

            let reader = LiveReader::open(&part_path, total_size, written)?;

            self.spawn_transfer(dl, response, completion, urls[i..].to_vec());

            return Ok((DownloadReader::Live(reader), true));
        }

        Err(DownloadError::NoMirrorAvailable { path })
    }

    /// Wraps [`Self::get_file`] under a single process-wide permit so at
    /// most one background (pre-warm) transfer runs at a time, and waits
    /// for completion if a new transfer was started. The returned reader
    /// is discarded; only completion matters to callers.
    pub async fn background_download(&self, path: PathBuf, urls: &[String]) -> Result<(), DownloadError> {
        let _permit = self.background_permit.lock().await;
        info!(path = %path.display(), "starting background download");

        let (tx, rx) = oneshot::channel();
        let (_reader, is_new) = self.get_file(path, urls, Some(tx), false).await?;

        if is_new {
            rx.await.unwrap_or(Ok(()))?;
        }
        Ok(())
    }

    fn spawn_transfer(
        &self,
        dl: Arc<OngoingDownload>,
        response: reqwest::Response,
        completion: Option<CompletionSignal>,
        _remaining_urls: Vec<String>,
    ) {
        let ongoing_map = self.ongoing.clone();
        tokio::spawn(async move {
            let result = copy_response_to_part(&dl, response).await;

            {
                let mut ongoing = ongoing_map.lock().await;
                ongoing.remove(&dl.final_path);
            }

            if let Err(ref err) = result {
                warn!(path = %dl.final_path.display(), error = %err, "download failed");
                let _ = tokio_fs::remove_file(&dl.part_path).await;
            } else {
                info!(path = %dl.final_path.display(), "download complete");
            }

            if let Some(tx) = completion {
                let _ = tx.send(result);
            }
        });
    }
}

async fn copy_response_to_part(
    dl: &OngoingDownload,
    mut response: reqwest::Response,
) -> Result<(), DownloadError> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio_fs::File::create(&dl.part_path)
        .await
        .map_err(|e| DownloadError::io(dl.part_path.clone(), e))?;

    let mut total_written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(dl.part_path.clone(), e))?;
        total_written += chunk.len() as u64;
        dl.written.store(total_written, Ordering::Release);
    }
    file.flush().await.map_err(|e| DownloadError::io(dl.part_path.clone(), e))?;
    drop(file);

    if dl.total_size != 0 && total_written < dl.total_size {
        return Err(DownloadError::ShortRead {
            path: dl.final_path.clone(),
            got: total_written,
            want: dl.total_size,
        });
    }

    tokio_fs::rename(&dl.part_path, &dl.final_path)
        .await
        .map_err(|e| DownloadError::io(dl.final_path.clone(), e))?;

    if let Some(mtime) = dl.server_mtime {
        let path = dl.final_path.clone();
        let _ = tokio::task::spawn_blocking(move || {
            filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(mtime))
        })
        .await;
    }

    Ok(())
}

fn part_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".part");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(part_path_for(Path::new("/cache/acl-1.pkg")), PathBuf::from("/cache/acl-1.pkg.part"));
    }
}
