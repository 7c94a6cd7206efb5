//! Turns a `DownloadReader` into a chunked byte stream for the HTTP range
//! server, retrying short reads of zero (data not downloaded yet) instead
//! of treating them as EOF.
//!
//! Grounded on the live-reader semantics of spec.md §4.5.2; the retry loop
//! here is the HTTP-facing half of "the caller — typically the HTTP range
//! server — will retry".

use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures_util::Stream;
use pkgmirror_download::DownloadReader;

const CHUNK_SIZE: usize = 64 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Streams `[start, end)` of `reader`.
pub fn range_stream(mut reader: DownloadReader, start: u64, end: u64) -> impl Stream<Item = std::io::Result<Bytes>> {
    stream! {
        if let Err(err) = tokio::task::block_in_place(|| reader.seek(SeekFrom::Start(start))) {
            yield Err(err);
            return;
        }

        let mut remaining = end.saturating_sub(start);
        let mut buf = vec![0u8; CHUNK_SIZE];

        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            let read = tokio::task::block_in_place(|| reader.read(&mut buf[..want]));
            match read {
                Ok(0) => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Ok(n) => {
                    remaining -= n as u64;
                    yield Ok(Bytes::copy_from_slice(&buf[..n]));
                }
                Err(err) => {
                    yield Err(err);
                    return;
                }
            }
        }
    }
}

/// Total declared size of `reader`'s content.
pub fn reader_total_size(reader: &DownloadReader) -> std::io::Result<u64> {
    match reader {
        DownloadReader::Live(r) => Ok(r.total_size()),
        DownloadReader::Static(f) => Ok(f.metadata()?.len()),
    }
}

/// Parses a single-range `Range: bytes=start-end` header value. Multi-range
/// requests are not supported; callers fall back to serving the full body.
pub fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end = if end.is_empty() { None } else { end.parse().ok() };
    Some((start, end))
}
