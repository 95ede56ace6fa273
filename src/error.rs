//! Error types for the record logging server.
//!
//! A single [`LogdError`] enum consolidates the failure classes the server
//! distinguishes:
//!
//! - **`Io`**: file or socket failures that terminate the current
//!   connection or abort startup. Transient conditions (would-block reads,
//!   partial sends) never surface here; the async runtime retries them.
//! - **`RecordTooLarge`**: an unterminated record grew past the configured
//!   limit; the offending connection is dropped, others are unaffected.
//! - **`InvalidSeek`** / **`OutOfRange`**: an invalid position or record
//!   index on the local handle; state is left unchanged.
//! - **`Interrupted`**: a cancellable lock wait was cut short by shutdown.
//! - **`Config` / `Configuration`**: settings could not be loaded or
//!   failed validation; the server refuses to start.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, LogdError>;

/// Primary error type for the record logging server.
#[derive(Error, Debug)]
pub enum LogdError {
    /// File or socket I/O failed.
    ///
    /// Per-connection I/O errors are isolated to that connection's worker;
    /// errors during startup abort the process with a non-zero status.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An unterminated record exceeded the configured size limit.
    #[error("record exceeds maximum size of {limit} bytes")]
    RecordTooLarge { limit: usize },

    /// A seek targeted a position past the end of the stored data.
    #[error("seek position {position} is past end of data ({size} bytes)")]
    InvalidSeek { position: u64, size: u64 },

    /// A record index was not present in the ring buffer.
    #[error("record index {index} is not stored ({len} records held)")]
    OutOfRange { index: u32, len: usize },

    /// A blocking wait was interrupted by shutdown.
    #[error("operation interrupted by shutdown")]
    Interrupted,

    /// Configuration file parsing failed.
    ///
    /// **Source**: wraps `config::ConfigError` from the `config` crate.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration values parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),
}
