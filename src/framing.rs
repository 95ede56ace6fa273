//! Splitting raw byte streams into newline-terminated records.
//!
//! Every writer into the system (a TCP connection, the local handle) owns
//! one [`RecordAssembler`]. Incoming bytes accumulate until a newline
//! arrives; each newline-terminated region is committed as one immutable
//! record (newline included) and any unterminated tail stays buffered for
//! the next write. Commits transfer the bytes out of the accumulator by
//! move, not copy.

use bytes::{Bytes, BytesMut};

use crate::error::{LogdError, Result};

/// Per-writer partial-record accumulator.
#[derive(Debug, Default)]
pub struct RecordAssembler {
    buf: BytesMut,
    limit: Option<usize>,
}

impl RecordAssembler {
    /// Accumulator without a size bound (local-handle path).
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator that refuses unterminated records larger than `limit`
    /// bytes (network path).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit: Some(limit),
        }
    }

    /// Append `input` and drain every completed record.
    ///
    /// Returns the records completed by this call, oldest first, each
    /// including its terminating newline. Fails with
    /// [`LogdError::RecordTooLarge`] when the remaining unterminated tail
    /// exceeds the configured limit; the assembler should be discarded
    /// along with its connection after that.
    pub fn push(&mut self, input: &[u8]) -> Result<Vec<Bytes>> {
        self.buf.extend_from_slice(input);
        let mut records = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            records.push(self.buf.split_to(pos + 1).freeze());
        }
        if let Some(limit) = self.limit {
            if self.buf.len() > limit {
                return Err(LogdError::RecordTooLarge { limit });
            }
        }
        Ok(records)
    }

    /// Bytes buffered since the last completed record.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// True while an unterminated record is buffered.
    pub fn in_progress(&self) -> bool {
        !self.buf.is_empty()
    }
}
