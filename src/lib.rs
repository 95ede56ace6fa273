//! Core library for `linelogd`, a newline-delimited record logging server.
//!
//! A long-lived TCP server accepts concurrent client connections on a
//! well-known port, appends newline-terminated records into a persistent
//! [`record_log::RecordLog`], and after each completed record streams the
//! accumulated log content back to the committing client. A periodic
//! [`timestamp`] writer interleaves synthetic records into the same log.
//! In parallel, [`device::LogDevice`] exposes the same framing semantics
//! over a bounded in-memory [`ring::RecordRing`] of recent records through
//! a character-device-style handle (read, write, seek, seek-to-record).

pub mod config;
pub mod daemon;
pub mod device;
pub mod error;
pub mod framing;
pub mod record_log;
pub mod ring;
pub mod server;
pub mod shutdown;
pub mod timestamp;
pub mod worker;

pub use error::{LogdError, Result};
