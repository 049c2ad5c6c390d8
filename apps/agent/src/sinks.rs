use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use clipwatch_policy::{AlertRequest, AlertSink, ClipboardLock, DispatchError};

/// Writes each alert as a JSON file into a spool directory for the
/// out-of-process transport to deliver. Attachment bytes land in a
/// sidecar file next to the JSON.
pub struct SpoolAlertSink {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl SpoolAlertSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }
}

impl AlertSink for SpoolAlertSink {
    fn send(&self, alert: &AlertRequest) -> Result<(), DispatchError> {
        // The sequence keeps same-millisecond alerts from overwriting
        // each other.
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let stamp = format!("{}-{:04}", alert.at.format("%Y%m%d%H%M%S%3f"), seq);
        let json_path = self.dir.join(format!("alert-{}.json", stamp));
        let body = serde_json::to_string_pretty(alert)
            .map_err(|err| DispatchError::Message(format!("serialize alert: {}", err)))?;
        fs::write(&json_path, body)?;
        if let Some(bytes) = &alert.attachment {
            fs::write(self.dir.join(format!("alert-{}.bin", stamp)), bytes)?;
        }
        info!(path = %json_path.display(), "violation alert spooled");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct LockMarker {
    locked: bool,
    since: DateTime<Utc>,
}

/// Maintains the lock marker file the capture hook consults before
/// allowing clipboard reads.
pub struct MarkerFileLock {
    path: PathBuf,
}

impl MarkerFileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ClipboardLock for MarkerFileLock {
    fn set_locked(&self, locked: bool, since: DateTime<Utc>) -> Result<(), DispatchError> {
        let body = serde_json::to_string(&LockMarker { locked, since })
            .map_err(|err| DispatchError::Message(format!("serialize lock marker: {}", err)))?;
        fs::write(&self.path, body)?;
        info!(locked, path = %self.path.display(), "clipboard lock marker updated");
        Ok(())
    }
}
