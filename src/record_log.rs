//! File-backed append-only record log.
//!
//! The log is the single persistent store shared by every connection worker
//! and the timestamp writer. All access goes through one coarse mutex over
//! the file handle and the tracked byte length: record writes are short,
//! and read-after-write consistency across producers is simplest under a
//! single lock.
//!
//! Reads use positional I/O (`FileExt::read_at`), so the append cursor is
//! never moved by a reader; the file is opened with `O_APPEND` and only
//! ever written at the end.
//!
//! # Thread Safety
//!
//! - **Appends**: serialized by the internal mutex. The tracked length is
//!   updated only after the write succeeds, so readers observe either the
//!   pre-append or the post-append length, never a torn intermediate.
//! - **Reads**: also under the mutex; the sink callback receives one
//!   contiguous slice and must not call back into the log.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;

struct LogInner {
    file: File,
    len: u64,
}

/// Shared append-only byte log backed by a file.
///
/// Created on startup with [`RecordLog::open`]; destroyed on graceful
/// shutdown with [`RecordLog::remove`], which closes the handle and deletes
/// the backing file. Pre-existing file content is preserved on open.
pub struct RecordLog {
    path: PathBuf,
    inner: Mutex<Option<LogInner>>,
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "record log is closed")
}

impl RecordLog {
    /// Open (or create) the log file in append+read mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .append(true)
            .read(true)
            .create(true)
            .open(&path)?;
        let len = file.metadata()?.len();
        debug!(path = %path.display(), len, "record log opened");
        Ok(Self {
            path,
            inner: Mutex::new(Some(LogInner { file, len })),
        })
    }

    /// Append all of `bytes` as one atomic unit and flush to the OS.
    ///
    /// Returns the new log length. On failure the tracked length keeps its
    /// pre-call value.
    pub fn append(&self, bytes: &[u8]) -> Result<u64> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or_else(closed)?;
        inner.file.write_all(bytes)?;
        inner.file.flush()?;
        inner.len += bytes.len() as u64;
        Ok(inner.len)
    }

    /// Current byte length, observed under the lock.
    pub fn snapshot_size(&self) -> u64 {
        self.inner.lock().as_ref().map_or(0, |inner| inner.len)
    }

    /// Read up to `max_len` bytes starting at `offset` and hand the
    /// contiguous slice to `sink`. Returns the number of bytes read.
    ///
    /// The range is clipped to the tracked length; a range entirely past
    /// the end yields an empty slice. `sink` runs under the log lock and
    /// must not reacquire it.
    pub fn read_range<F>(&self, offset: u64, max_len: usize, sink: F) -> Result<usize>
    where
        F: FnOnce(&[u8]) -> Result<()>,
    {
        let guard = self.inner.lock();
        let inner = guard.as_ref().ok_or_else(closed)?;
        let end = inner.len.min(offset.saturating_add(max_len as u64));
        if offset >= end {
            sink(&[])?;
            return Ok(0);
        }
        let want = (end - offset) as usize;
        let mut buf = vec![0u8; want];
        let mut read = 0usize;
        while read < want {
            let n = inner.file.read_at(&mut buf[read..], offset + read as u64)?;
            if n == 0 {
                break;
            }
            read += n;
        }
        buf.truncate(read);
        sink(&buf)?;
        Ok(read)
    }

    /// Close the log and delete the backing file.
    ///
    /// Idempotent; later operations fail with an I/O error.
    pub fn remove(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        if guard.take().is_some() {
            std::fs::remove_file(&self.path)?;
            debug!(path = %self.path.display(), "record log removed");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> (tempfile::TempDir, RecordLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = RecordLog::open(dir.path().join("records")).unwrap();
        (dir, log)
    }

    #[test]
    fn test_append_concatenates() {
        let (_dir, log) = temp_log();
        log.append(b"one\n").unwrap();
        log.append(b"two\n").unwrap();
        log.append(b"three\n").unwrap();
        assert_eq!(log.snapshot_size(), 14);
        assert_eq!(std::fs::read(log.path()).unwrap(), b"one\ntwo\nthree\n");
    }

    #[test]
    fn test_append_returns_new_length() {
        let (_dir, log) = temp_log();
        assert_eq!(log.append(b"abcd\n").unwrap(), 5);
        assert_eq!(log.append(b"ef\n").unwrap(), 8);
    }

    #[test]
    fn test_read_range_window() {
        let (_dir, log) = temp_log();
        log.append(b"hello\nworld\n").unwrap();
        let mut out = Vec::new();
        let n = log
            .read_range(6, 6, |chunk| {
                out.extend_from_slice(chunk);
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 6);
        assert_eq!(out, b"world\n");
    }

    #[test]
    fn test_read_range_clips_to_length() {
        let (_dir, log) = temp_log();
        log.append(b"short\n").unwrap();
        let mut out = Vec::new();
        let n = log
            .read_range(0, 1024, |chunk| {
                out.extend_from_slice(chunk);
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 6);
        assert_eq!(out, b"short\n");
    }

    #[test]
    fn test_read_range_past_end_is_empty() {
        let (_dir, log) = temp_log();
        log.append(b"x\n").unwrap();
        let n = log.read_range(10, 4, |chunk| {
            assert!(chunk.is_empty());
            Ok(())
        });
        assert_eq!(n.unwrap(), 0);
    }

    #[test]
    fn test_open_preserves_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");
        {
            let log = RecordLog::open(&path).unwrap();
            log.append(b"kept\n").unwrap();
        }
        let log = RecordLog::open(&path).unwrap();
        assert_eq!(log.snapshot_size(), 5);
        log.append(b"more\n").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"kept\nmore\n");
    }

    #[test]
    fn test_remove_deletes_file() {
        let (dir, log) = temp_log();
        log.append(b"gone\n").unwrap();
        log.remove().unwrap();
        assert!(!dir.path().join("records").exists());
        // Idempotent.
        log.remove().unwrap();
        assert!(log.append(b"late\n").is_err());
        assert_eq!(log.snapshot_size(), 0);
    }

    #[test]
    fn test_concurrent_appends_never_tear() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(RecordLog::open(dir.path().join("records")).unwrap());

        let mut handles = Vec::new();
        for writer in 0..4 {
            let log = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    let record = format!("writer{writer}-{i}\n");
                    log.append(record.as_bytes()).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(log.snapshot_size(), content.len() as u64);
        // Every line is exactly one committed record.
        assert_eq!(content.lines().count(), 200);
        for line in content.lines() {
            assert!(line.starts_with("writer"), "torn record: {line:?}");
        }
    }
}
