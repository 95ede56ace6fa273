#![allow(unsafe_code)]
//! Process detachment for `-d` mode.

use std::io;

/// Detach from the controlling terminal: fork into the background, start a
/// new session, change to `/` and point stdio at `/dev/null`.
///
/// Must run after the listen socket exists (so bind failures stay in the
/// foreground) and before the async runtime starts; forking with live
/// runtime threads is not supported.
pub fn daemonize() -> io::Result<()> {
    // SAFETY: called from main before any runtime threads are spawned.
    let rc = unsafe { libc::daemon(0, 0) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
