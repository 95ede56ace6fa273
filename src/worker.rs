//! Per-connection worker.
//!
//! One worker task owns each accepted connection: it reads bytes, splits
//! them into newline-terminated records, appends every completed record to
//! the shared [`RecordLog`], and after each append streams the log delta
//! back to the client.
//!
//! Replay is incremental per connection: `last_replayed` starts at 0, so a
//! client's first reply carries the entire accumulated log and later
//! replies carry only the bytes appended since its previous reply. Every
//! worker eventually sees every byte appended before and during its
//! lifetime without re-sending the whole log on each record.
//!
//! Failures are isolated: an I/O error, an oversized record or a broken
//! pipe terminates this worker only; the supervisor and sibling
//! connections keep running.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::framing::RecordAssembler;
use crate::record_log::RecordLog;
use crate::shutdown::ShutdownSignal;

pub struct ConnectionWorker {
    socket: TcpStream,
    peer: SocketAddr,
    log: Arc<RecordLog>,
    assembler: RecordAssembler,
    recv_buf: Vec<u8>,
    max_record_bytes: usize,
    last_replayed: u64,
    shutdown: ShutdownSignal,
    done: Arc<AtomicBool>,
}

impl ConnectionWorker {
    pub fn new(
        socket: TcpStream,
        peer: SocketAddr,
        log: Arc<RecordLog>,
        settings: &Settings,
        shutdown: ShutdownSignal,
        done: Arc<AtomicBool>,
    ) -> Self {
        Self {
            socket,
            peer,
            log,
            assembler: RecordAssembler::with_limit(settings.server.max_record_bytes),
            recv_buf: vec![0u8; settings.server.recv_buffer_bytes],
            max_record_bytes: settings.server.max_record_bytes,
            last_replayed: 0,
            shutdown,
            done,
        }
    }

    /// Drive the connection to completion, then mark this worker done so
    /// the supervisor can reap it.
    pub async fn run(mut self) {
        if let Err(err) = self.serve().await {
            warn!(peer = %self.peer, "connection worker error: {err}");
        }
        self.done.store(true, Ordering::SeqCst);
    }

    async fn serve(&mut self) -> Result<()> {
        loop {
            if self.shutdown.is_requested() {
                break;
            }
            let n = tokio::select! {
                res = self.socket.read(&mut self.recv_buf) => res?,
                _ = self.shutdown.wait() => break,
            };
            if n == 0 {
                info!("Closed connection from {}", self.peer.ip());
                break;
            }
            debug!(peer = %self.peer, bytes = n, "received");

            let records = self.assembler.push(&self.recv_buf[..n])?;
            let completed = !records.is_empty();
            for record in records {
                self.log.append(&record)?;
                self.replay().await?;
            }

            // A full read that completed no record means the record is
            // larger than the buffer: double it, bounded by the record cap.
            if !completed && n == self.recv_buf.len() && self.recv_buf.len() < self.max_record_bytes
            {
                let grown = (self.recv_buf.len() * 2).min(self.max_record_bytes);
                debug!(peer = %self.peer, grown, "receive buffer grown");
                self.recv_buf.resize(grown, 0);
            }
        }
        Ok(())
    }

    /// Send every log byte in `[last_replayed, current length)` to the
    /// client.
    ///
    /// The delta is copied out under the log lock, then transmitted outside
    /// it; `write_all` absorbs partial sends.
    async fn replay(&mut self) -> Result<()> {
        let current = self.log.snapshot_size();
        if current <= self.last_replayed {
            return Ok(());
        }
        let want = (current - self.last_replayed) as usize;
        let mut tx_buf = Vec::with_capacity(want);
        self.log.read_range(self.last_replayed, want, |chunk| {
            tx_buf.extend_from_slice(chunk);
            Ok(())
        })?;
        self.socket.write_all(&tx_buf).await?;
        self.last_replayed += tx_buf.len() as u64;
        debug!(peer = %self.peer, sent = tx_buf.len(), "replayed");
        Ok(())
    }
}
