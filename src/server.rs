//! Server supervisor: listener setup, accept loop, worker bookkeeping and
//! graceful shutdown.
//!
//! [`bind`] runs synchronously before the async runtime starts so that a
//! `-d` detach can happen between listen and serving, and so that bind
//! failures surface in the foreground with a non-zero exit. [`Server::run`]
//! then owns the accept loop: each accepted connection becomes a spawned
//! [`ConnectionWorker`] tracked in the worker list, finished workers are
//! reaped after every accept, and on shutdown the remaining workers are
//! drained before the record log is closed and its file removed.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::Result;
use crate::record_log::RecordLog;
use crate::shutdown::ShutdownController;
use crate::timestamp;
use crate::worker::ConnectionWorker;

struct WorkerEntry {
    peer: SocketAddr,
    done: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Create the listening socket: `SO_REUSEPORT`, bind, listen.
///
/// Returns a blocking listener; [`Server::run`] registers it with the
/// runtime. Kept synchronous so it can run before daemonizing.
pub fn bind(settings: &Settings) -> Result<std::net::TcpListener> {
    let addr = settings.socket_addr()?;
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_port(true)?;
    socket.bind(&addr.into())?;
    socket.listen(settings.server.listen_backlog)?;
    let listener: std::net::TcpListener = socket.into();
    info!("listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Owns the shared record log, the shutdown state and the worker list.
pub struct Server {
    settings: Settings,
    log: Arc<RecordLog>,
    shutdown: Arc<ShutdownController>,
    workers: Mutex<Vec<WorkerEntry>>,
}

impl Server {
    /// Open the record log and prepare the supervisor state.
    pub fn new(settings: Settings) -> Result<Self> {
        let log = Arc::new(RecordLog::open(&settings.storage.data_file)?);
        Ok(Self {
            settings,
            log,
            shutdown: Arc::new(ShutdownController::new()),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Handle for requesting shutdown (signal task, tests).
    pub fn shutdown_handle(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// The shared record log (tests, local tooling).
    pub fn record_log(&self) -> Arc<RecordLog> {
        Arc::clone(&self.log)
    }

    /// Serve connections until shutdown is requested, then drain and tear
    /// down: no further accepts, all workers joined, the timestamp writer
    /// stopped, the log file removed.
    pub async fn run(&self, listener: std::net::TcpListener) -> Result<()> {
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;

        let ts_writer = tokio::spawn(timestamp::run(
            Arc::clone(&self.log),
            Duration::from_secs(self.settings.timestamp.interval_secs),
            self.shutdown.signal(),
        ));

        let mut shutdown = self.shutdown.signal();
        loop {
            tokio::select! {
                res = listener.accept() => match res {
                    Ok((socket, peer)) => self.spawn_worker(socket, peer),
                    // Accept failures are survivable; the listener stays up.
                    Err(err) => error!("accept failed: {err}"),
                },
                _ = shutdown.wait() => break,
            }
            self.reap_finished().await;
        }

        drop(listener);
        let remaining = self.workers.lock().len();
        info!(remaining, "shutting down");
        self.drain_workers().await;
        if let Err(err) = ts_writer.await {
            error!("timestamp writer task failed: {err}");
        }
        self.log.remove()?;
        info!("shutdown complete");
        Ok(())
    }

    fn spawn_worker(&self, socket: TcpStream, peer: SocketAddr) {
        info!("Accepted connection from {}", peer.ip());
        let done = Arc::new(AtomicBool::new(false));
        let worker = ConnectionWorker::new(
            socket,
            peer,
            Arc::clone(&self.log),
            &self.settings,
            self.shutdown.signal(),
            Arc::clone(&done),
        );
        let join = tokio::spawn(worker.run());
        self.workers.lock().insert(0, WorkerEntry { peer, done, join });
    }

    /// Remove and join every worker whose `done` flag is set. Joins happen
    /// outside the list lock.
    async fn reap_finished(&self) {
        let finished: Vec<WorkerEntry> = {
            let mut workers = self.workers.lock();
            let mut finished = Vec::new();
            let mut i = 0;
            while i < workers.len() {
                if workers[i].done.load(Ordering::SeqCst) {
                    finished.push(workers.remove(i));
                } else {
                    i += 1;
                }
            }
            finished
        };
        for entry in finished {
            debug!(peer = %entry.peer, "reaping worker");
            if let Err(err) = entry.join.await {
                error!(peer = %entry.peer, "worker task failed: {err}");
            }
        }
    }

    async fn drain_workers(&self) {
        let drained: Vec<WorkerEntry> = std::mem::take(&mut *self.workers.lock());
        for entry in drained {
            if let Err(err) = entry.join.await {
                error!(peer = %entry.peer, "worker task failed: {err}");
            }
        }
    }
}
