//! Character-device-style handle over the record ring.
//!
//! [`LogDevice`] owns the shared state of the local logging path: the
//! bounded [`RecordRing`] of committed records and the write-side
//! [`RecordAssembler`]. [`LogDevice::open`] attaches a [`DeviceHandle`]
//! carrying a per-open byte cursor; dropping the handle releases it.
//!
//! Every operation holds the device mutex for its duration. The mutex wait
//! is cancellable: when the device was created with a shutdown signal, a
//! blocked acquirer returns [`LogdError::Interrupted`] instead of the lock
//! once shutdown is requested.

use std::io::SeekFrom;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{LogdError, Result};
use crate::framing::RecordAssembler;
use crate::ring::RecordRing;
use crate::shutdown::ShutdownSignal;

#[derive(Debug, Default)]
struct DeviceState {
    ring: RecordRing,
    assembler: RecordAssembler,
}

/// Shared device state behind a cancellable mutex.
#[derive(Debug)]
pub struct LogDevice {
    state: Mutex<DeviceState>,
    shutdown: Option<ShutdownSignal>,
}

impl LogDevice {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DeviceState::default()),
            shutdown: None,
        }
    }

    /// Device whose lock waits abort with [`LogdError::Interrupted`] once
    /// `shutdown` fires.
    pub fn with_shutdown(shutdown: ShutdownSignal) -> Self {
        Self {
            state: Mutex::new(DeviceState::default()),
            shutdown: Some(shutdown),
        }
    }

    /// Attach a new handle with its cursor at position 0.
    pub fn open(self: &Arc<Self>) -> DeviceHandle {
        DeviceHandle {
            device: Arc::clone(self),
            pos: 0,
        }
    }

    /// Total bytes currently stored, as if all records were concatenated.
    pub async fn total_bytes(&self) -> Result<usize> {
        Ok(self.lock().await?.ring.total_bytes())
    }

    /// Number of records currently stored.
    pub async fn record_count(&self) -> Result<usize> {
        Ok(self.lock().await?.ring.len())
    }

    async fn lock(&self) -> Result<MutexGuard<'_, DeviceState>> {
        match &self.shutdown {
            None => Ok(self.state.lock().await),
            Some(signal) => {
                if signal.is_requested() {
                    return Err(LogdError::Interrupted);
                }
                let mut signal = signal.clone();
                tokio::select! {
                    guard = self.state.lock() => Ok(guard),
                    _ = signal.wait() => Err(LogdError::Interrupted),
                }
            }
        }
    }
}

impl Default for LogDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// One open of the device: shared state plus a private byte cursor.
#[derive(Debug)]
pub struct DeviceHandle {
    device: Arc<LogDevice>,
    pos: u64,
}

impl DeviceHandle {
    /// Accept `bytes` into the device.
    ///
    /// Bytes accumulate until a newline; each newline-terminated region is
    /// committed as one ring entry and the unterminated tail stays buffered
    /// for the next write. Always reports the full input length on success.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut state = self.device.lock().await?;
        let records = state.assembler.push(bytes)?;
        for record in records {
            if let Some(evicted) = state.ring.push(record) {
                debug!(len = evicted.len(), "evicted oldest record");
            }
        }
        Ok(bytes.len())
    }

    /// Copy stored bytes at the cursor into `buf`.
    ///
    /// Copies from at most one record per call, like a device read: up to
    /// `min(record remainder, buf.len())` bytes. Returns 0 at end of data.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let state = self.device.lock().await?;
        let Some((entry, intra)) = state.ring.find_at(self.pos as usize) else {
            return Ok(0);
        };
        let n = (entry.len() - intra).min(buf.len());
        buf[..n].copy_from_slice(&entry[intra..intra + n]);
        drop(state);
        self.pos += n as u64;
        Ok(n)
    }

    /// Move the cursor.
    ///
    /// `SeekFrom::End(n)` resolves to `total_bytes - n` (an END seek of N
    /// lands N bytes before the end of data, not past it). Negative results
    /// clamp to 0; results past the end of data fail with
    /// [`LogdError::InvalidSeek`] and leave the cursor unchanged.
    pub async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let state = self.device.lock().await?;
        let size = state.ring.total_bytes() as i128;
        let target: i128 = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(offset) => i128::from(self.pos) + i128::from(offset),
            SeekFrom::End(offset) => size - i128::from(offset),
        };
        let target = target.max(0);
        if target > size {
            return Err(LogdError::InvalidSeek {
                position: target as u64,
                size: size as u64,
            });
        }
        drop(state);
        self.pos = target as u64;
        Ok(self.pos)
    }

    /// Set the cursor to the start of record `record_index` (0 = oldest)
    /// plus `byte_offset`.
    ///
    /// Fails with [`LogdError::OutOfRange`] when the record is not stored;
    /// the cursor is unchanged on failure.
    pub async fn seek_to_record(&mut self, record_index: u32, byte_offset: u32) -> Result<()> {
        let state = self.device.lock().await?;
        let pos = state.ring.offset_of(record_index, byte_offset)?;
        drop(state);
        self.pos = pos;
        Ok(())
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_commits_on_newline() {
        let device = Arc::new(LogDevice::new());
        let mut handle = device.open();
        assert_eq!(handle.write(b"first\n").await.unwrap(), 6);
        assert_eq!(device.record_count().await.unwrap(), 1);
        assert_eq!(device.total_bytes().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_partial_write_buffers_until_newline() {
        let device = Arc::new(LogDevice::new());
        let mut handle = device.open();
        handle.write(b"abc").await.unwrap();
        assert_eq!(device.record_count().await.unwrap(), 0);
        handle.write(b"de\n").await.unwrap();
        assert_eq!(device.record_count().await.unwrap(), 1);

        let mut buf = [0u8; 16];
        let n = handle.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"abcde\n");
    }

    #[tokio::test]
    async fn test_read_advances_and_hits_eof() {
        let device = Arc::new(LogDevice::new());
        let mut handle = device.open();
        handle.write(b"ab\ncd\n").await.unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(handle.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf, b"ab");
        // Read stops at the record boundary.
        let mut buf = [0u8; 8];
        assert_eq!(handle.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], b'\n');
        assert_eq!(handle.read(&mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], b"cd\n");
        assert_eq!(handle.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seek_set_cur_end() {
        let device = Arc::new(LogDevice::new());
        let mut handle = device.open();
        handle.write(b"abcd\nef\n").await.unwrap();

        assert_eq!(handle.seek(SeekFrom::Start(5)).await.unwrap(), 5);
        assert_eq!(handle.seek(SeekFrom::Current(2)).await.unwrap(), 7);
        // END resolves to size - offset.
        assert_eq!(handle.seek(SeekFrom::End(3)).await.unwrap(), 5);
        // Negative positions clamp to 0.
        assert_eq!(handle.seek(SeekFrom::Current(-100)).await.unwrap(), 0);
        assert_eq!(handle.seek(SeekFrom::End(100)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seek_past_end_rejected() {
        let device = Arc::new(LogDevice::new());
        let mut handle = device.open();
        handle.write(b"abcd\n").await.unwrap();
        handle.seek(SeekFrom::Start(2)).await.unwrap();
        let err = handle.seek(SeekFrom::Start(6)).await.unwrap_err();
        assert!(matches!(err, LogdError::InvalidSeek { position: 6, size: 5 }));
        // Cursor unchanged.
        assert_eq!(handle.position(), 2);
    }

    #[tokio::test]
    async fn test_seek_to_record() {
        let device = Arc::new(LogDevice::new());
        let mut handle = device.open();
        handle.write(b"one\ntwo\nthree\n").await.unwrap();

        handle.seek_to_record(1, 0).await.unwrap();
        assert_eq!(handle.position(), 4);
        let mut buf = [0u8; 4];
        let n = handle.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"two\n");

        handle.seek_to_record(2, 2).await.unwrap();
        assert_eq!(handle.position(), 10);

        let err = handle.seek_to_record(3, 0).await.unwrap_err();
        assert!(matches!(err, LogdError::OutOfRange { .. }));
        assert_eq!(handle.position(), 10);
    }

    #[tokio::test]
    async fn test_handles_share_state_but_not_cursor() {
        let device = Arc::new(LogDevice::new());
        let mut writer = device.open();
        let mut reader = device.open();
        writer.write(b"shared\n").await.unwrap();

        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"shared\n");
        assert_eq!(writer.position(), 0);
    }

    #[tokio::test]
    async fn test_interrupted_after_shutdown() {
        use crate::shutdown::ShutdownController;

        let controller = ShutdownController::new();
        let device = Arc::new(LogDevice::with_shutdown(controller.signal()));
        let mut handle = device.open();
        handle.write(b"ok\n").await.unwrap();

        controller.trigger();
        let err = handle.write(b"late\n").await.unwrap_err();
        assert!(matches!(err, LogdError::Interrupted));
        let mut buf = [0u8; 4];
        assert!(matches!(
            handle.read(&mut buf).await.unwrap_err(),
            LogdError::Interrupted
        ));
    }
}
