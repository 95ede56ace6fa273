//! Configuration management for the record logging server.
//!
//! Settings are plain data with serde defaults, optionally overridden from
//! a TOML file named on the command line. [`Settings::new`] loads and then
//! validates the result; invalid values refuse startup rather than failing
//! at runtime.
//!
//! ## Schema
//!
//! - **`log_level`**: logging verbosity when `RUST_LOG` is unset.
//! - **`server`**: listener and per-connection limits.
//!   - `bind_addr` / `port`: listen address, default `0.0.0.0:9000`.
//!   - `listen_backlog`: accept queue depth, default 10.
//!   - `recv_buffer_bytes`: initial receive buffer size, default 1 KiB.
//!     The buffer doubles while a record remains unterminated, up to
//!     `max_record_bytes`.
//!   - `max_record_bytes`: upper bound on a single record, default 1 MiB.
//!     A connection that exceeds it is dropped.
//! - **`storage.data_file`**: backing file for the record log, default
//!   `/var/tmp/aesdsocketdata`. Removed on graceful shutdown.
//! - **`timestamp.interval_secs`**: period of the timestamp writer,
//!   default 10 seconds.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use config::Config;
use serde::{Deserialize, Serialize};

use crate::error::{LogdError, Result};

/// Default path of the persistent record log.
pub const DEFAULT_DATA_FILE: &str = "/var/tmp/aesdsocketdata";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub timestamp: TimestampSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerSettings::default(),
            storage: StorageSettings::default(),
            timestamp: TimestampSettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub port: u16,
    pub listen_backlog: i32,
    pub recv_buffer_bytes: usize,
    pub max_record_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 9000,
            listen_backlog: 10,
            recv_buffer_bytes: 1024,
            max_record_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub data_file: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TimestampSettings {
    pub interval_secs: u64,
}

impl Default for TimestampSettings {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

impl Settings {
    /// Load settings from defaults, overridden by `config_path` if given.
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// The socket address the listener binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.server.bind_addr.parse().map_err(|_| {
            LogdError::Configuration(format!("invalid bind address: {}", self.server.bind_addr))
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    fn validate(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(LogdError::Configuration(format!(
                "invalid log level: {}",
                self.log_level
            )));
        }
        self.socket_addr()?;
        if self.server.listen_backlog < 1 {
            return Err(LogdError::Configuration(
                "listen_backlog must be at least 1".into(),
            ));
        }
        if self.server.recv_buffer_bytes == 0 {
            return Err(LogdError::Configuration(
                "recv_buffer_bytes must be non-zero".into(),
            ));
        }
        if self.server.max_record_bytes < self.server.recv_buffer_bytes {
            return Err(LogdError::Configuration(
                "max_record_bytes must be at least recv_buffer_bytes".into(),
            ));
        }
        if self.timestamp.interval_secs == 0 {
            return Err(LogdError::Configuration(
                "timestamp interval_secs must be at least 1".into(),
            ));
        }
        if self.storage.data_file.as_os_str().is_empty() {
            return Err(LogdError::Configuration("data_file cannot be empty".into()));
        }
        Ok(())
    }
}
