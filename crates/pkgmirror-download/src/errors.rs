//! Errors surfaced by the download manager.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("no mirror available for {path}")]
    NoMirrorAvailable { path: PathBuf },

    #[error("short read on {path}: got {got} of {want} bytes")]
    ShortRead { path: PathBuf, got: u64, want: u64 },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upstream request error: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl DownloadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
