use std::path::PathBuf;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use clipwatch_core::{CopyEvent, CopyKind, CopyPayload};
use clipwatch_policy::{AccountingStore, Monitor, ViolationStore};

/// One copy event per line of newline-delimited JSON. Binary payloads
/// arrive as a path to the captured blob.
#[derive(Debug, Deserialize, PartialEq)]
struct WireEvent {
    kind: CopyKind,
    size_bytes: u64,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
}

/// Reads copy events from stdin until the capture hook closes the
/// stream or ctrl-c arrives. Malformed lines are logged and skipped.
pub async fn run<A, V>(monitor: &Monitor<A, V>) -> std::io::Result<()>
where
    A: AccountingStore,
    V: ViolationStore,
{
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut skipped = 0usize;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("copy event stream closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let wire: WireEvent = match serde_json::from_str(&line) {
                    Ok(wire) => wire,
                    Err(err) => {
                        skipped += 1;
                        warn!(error = %err, "skipping malformed copy event");
                        continue;
                    }
                };
                let event = to_copy_event(wire).await;
                let decision = monitor.handle_copy(&event);
                debug!(?decision, "copy event handled");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "malformed copy events were skipped");
    }
    Ok(())
}

async fn to_copy_event(wire: WireEvent) -> CopyEvent {
    let payload = match wire.kind {
        CopyKind::Text => CopyPayload::Text(wire.text.unwrap_or_default()),
        CopyKind::Image | CopyKind::FileSet => {
            let bytes = match &wire.path {
                Some(path) => match tokio::fs::read(path).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        // Size accounting still uses the reported size.
                        warn!(
                            error = %err,
                            path = %path.display(),
                            "failed to read captured payload"
                        );
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };
            CopyPayload::Bytes(bytes)
        }
    };
    CopyEvent {
        kind: wire.kind,
        size_bytes: wire.size_bytes,
        payload,
    }
}
