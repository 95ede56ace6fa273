//! Periodic timestamp records.
//!
//! A dedicated task appends one `"timestamp: YYYY-MM-DD HH:MM:SS\n"`
//! record (local time) to the record log every period. Appends go through
//! [`RecordLog::append`] and therefore interleave atomically with client
//! records. Missed ticks coalesce instead of bursting; the task stops at
//! the first shutdown observation and never writes afterwards.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};

use crate::record_log::RecordLog;
use crate::shutdown::ShutdownSignal;

/// Wall-clock format of a timestamp record: date and time separated by a
/// space, second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render one timestamp record, terminating newline included.
pub fn format_record(now: &DateTime<Local>) -> String {
    format!("timestamp: {}\n", now.format(TIMESTAMP_FORMAT))
}

/// Run the periodic writer until shutdown.
pub async fn run(log: Arc<RecordLog>, period: Duration, mut shutdown: ShutdownSignal) {
    // First record lands one full period after startup.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if shutdown.is_requested() {
                    break;
                }
                let record = format_record(&Local::now());
                match log.append(record.as_bytes()) {
                    Ok(len) => debug!(len, "timestamp record appended"),
                    Err(err) => error!("timestamp append failed: {err}"),
                }
            }
            _ = shutdown.wait() => break,
        }
    }
    debug!("timestamp writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownController;

    #[test]
    fn test_record_format() {
        let now = Local::now();
        let record = format_record(&now);
        let re = regex::Regex::new(r"^timestamp: \d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\n$").unwrap();
        assert!(re.is_match(&record), "unexpected format: {record:?}");
    }

    #[tokio::test]
    async fn test_writer_appends_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(RecordLog::open(dir.path().join("records")).unwrap());
        let controller = ShutdownController::new();

        let writer = tokio::spawn(run(
            Arc::clone(&log),
            Duration::from_millis(50),
            controller.signal(),
        ));
        tokio::time::sleep(Duration::from_millis(140)).await;
        controller.trigger();
        tokio::time::timeout(Duration::from_secs(1), writer)
            .await
            .unwrap()
            .unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert!(lines.len() >= 2, "expected at least two ticks: {content:?}");
        let final_len = log.snapshot_size();
        for line in &lines {
            assert!(line.starts_with("timestamp: "));
        }

        // No further writes after shutdown.
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(log.snapshot_size(), final_len);
    }
}
