//! Download manager: deduplicated, resumable-view downloads to local
//! cache paths.

pub mod errors;
mod manager;
mod reader;

pub use errors::DownloadError;
pub use manager::{CompletionSignal, DownloadManager, DownloadReader};
pub use reader::LiveReader;
