//! Entry point for the `linelogd` server.
//!
//! Startup order matters here: settings load first, logging second, then
//! the listen socket is created synchronously so that `-d` can detach
//! between listen and serving and so that bind failures exit non-zero in
//! the foreground. Only then does the async runtime start. SIGINT and
//! SIGTERM trip the shutdown controller; a signal-initiated shutdown exits
//! with status 0 after the server has drained its workers and removed the
//! data file.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

use linelogd::config::Settings;
use linelogd::daemon;
use linelogd::server::{self, Server};

#[derive(Parser)]
#[command(name = "linelogd")]
#[command(about = "Newline-delimited record logging server", long_about = None)]
struct Cli {
    /// Detach from the controlling terminal after binding the listen socket
    #[arg(short = 'd', long = "daemon")]
    daemon: bool,

    /// Settings file (TOML); built-in defaults are used when omitted
    #[arg(long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::new(cli.config.as_deref()).context("failed to load settings")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    // Bind before daemonizing so startup failures surface in the foreground.
    let listener = server::bind(&settings).context("failed to bind listen socket")?;

    if cli.daemon {
        daemon::daemonize().context("failed to detach")?;
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(serve(settings, listener))
}

async fn serve(settings: Settings, listener: std::net::TcpListener) -> Result<()> {
    let server = Arc::new(Server::new(settings).context("failed to open record log")?);

    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
        info!("Caught signal, exiting");
        shutdown.trigger();
    });

    server.run(listener).await?;
    Ok(())
}
