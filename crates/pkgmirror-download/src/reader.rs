//! Live reader over an in-progress download: a random-access stream of
//! size `total_size` that never reads past the atomically-published
//! `written` offset.
//!
//! Grounded on `dynamicLimitReaderWithSize` in
//! `examples/original_source/cache/downloadmanager/download.go`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::errors::DownloadError;

/// A read-seekable view over a file that is still being written to by a
/// background transfer. `written` is shared with that transfer and only
/// ever grows.
pub struct LiveReader {
    file: File,
    total_size: u64,
    written: Arc<AtomicU64>,
    pos: u64,
}

impl LiveReader {
    pub(crate) fn open(path: &PathBuf, total_size: u64, written: Arc<AtomicU64>) -> Result<Self, DownloadError> {
        let file = File::open(path).map_err(|e| DownloadError::io(path.clone(), e))?;
        Ok(Self {
            file,
            total_size,
            written,
            pos: 0,
        })
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }
}

impl Read for LiveReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let limit = self.written.load(Ordering::Acquire);
        if self.pos >= limit {
            // Not an EOF: data simply isn't available yet. Callers retry.
            return Ok(0);
        }

        let remaining = (limit - self.pos) as usize;
        let want = buf.len().min(remaining);
        let n = self.file.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for LiveReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
            SeekFrom::End(offset) => self.total_size as i64 + offset,
        };
        let clamped = target.clamp(0, self.total_size as i64) as u64;
        self.pos = clamped;
        self.file.seek(SeekFrom::Start(clamped))?;
        Ok(clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn read_clamps_to_written() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        tmp.flush().unwrap();

        let written = Arc::new(AtomicU64::new(5));
        let mut reader = LiveReader::open(&tmp.path().to_path_buf(), 11, written.clone()).unwrap();

        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");

        // no more data available yet: short read of zero, not EOF-as-error
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(n, 0);

        written.store(11, Ordering::Release);
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b" world");
    }

    #[test]
    fn seek_clamps_to_total_size() {
        let tmp = NamedTempFile::new().unwrap();
        let written = Arc::new(AtomicU64::new(10));
        let mut reader = LiveReader::open(&tmp.path().to_path_buf(), 10, written).unwrap();
        assert_eq!(reader.seek(SeekFrom::Start(100)).unwrap(), 10);
        assert_eq!(reader.seek(SeekFrom::Current(-5)).unwrap(), 5);
        assert_eq!(reader.seek(SeekFrom::End(0)).unwrap(), 10);
    }
}
