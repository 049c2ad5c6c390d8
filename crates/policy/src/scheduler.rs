use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::config::PolicyConfig;
use crate::monitor::Monitor;
use crate::store::{AccountingStore, ViolationStore};

/// Handle over the two periodic trigger tasks. Dropping it without
/// calling `shutdown` leaves the tasks running until the runtime stops.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signals both tasks and waits for them to finish. Cancellation is
    /// only observed between ticks, never mid-transition.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Spawns the hourly rotation and cool-down expiry triggers.
pub fn spawn<A, V>(monitor: Arc<Monitor<A, V>>, config: &PolicyConfig) -> SchedulerHandle
where
    A: AccountingStore + Send + 'static,
    V: ViolationStore + Send + 'static,
{
    let (tx, rx) = watch::channel(false);

    let rotation_monitor = Arc::clone(&monitor);
    let rotation = tokio::spawn(run_tick(
        "rotation",
        config.rotation_interval(),
        rx.clone(),
        move || rotation_monitor.rotate_windows(),
    ));

    let expiry = tokio::spawn(run_tick(
        "expiry",
        config.expiry_check_interval(),
        rx,
        move || monitor.run_expiry_check(),
    ));

    SchedulerHandle {
        shutdown: tx,
        tasks: vec![rotation, expiry],
    }
}

async fn run_tick<F>(
    name: &'static str,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    tick: F,
) where
    F: Fn() + Send + 'static,
{
    loop {
        select! {
            _ = sleep(interval) => tick(),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!(trigger = name, "periodic trigger stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PolicyEngine;
    use crate::escalation::{
        AlertRequest, AlertSink, ClipboardLock, DispatchError, EscalationDispatcher,
    };
    use crate::store::MemoryStateStore;
    use chrono::{DateTime, Utc};
    use clipwatch_core::CopyEvent;

    struct NullSink;

    impl AlertSink for NullSink {
        fn send(&self, _alert: &AlertRequest) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    impl ClipboardLock for NullSink {
        fn set_locked(&self, _locked: bool, _since: DateTime<Utc>) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    fn monitor() -> Arc<Monitor<MemoryStateStore, MemoryStateStore>> {
        let engine = PolicyEngine::new(
            MemoryStateStore::default(),
            MemoryStateStore::default(),
            PolicyConfig::default(),
        );
        let dispatcher =
            EscalationDispatcher::new("test-host", Box::new(NullSink), Box::new(NullSink));
        Arc::new(Monitor::new(engine, dispatcher))
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_trigger_folds_the_window() {
        let monitor = monitor();
        monitor.handle_copy(&CopyEvent::text("x".repeat(120)));
        assert_eq!(monitor.accounting_snapshot().window_bytes_1h, 120);

        let handle = spawn(Arc::clone(&monitor), &PolicyConfig::default());
        tokio::time::sleep(Duration::from_secs(3601)).await;

        let record = monitor.accounting_snapshot();
        assert_eq!(record.window_bytes_1h, 0);
        assert_eq!(record.window_bytes_24h, 120);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_both_triggers() {
        let monitor = monitor();
        let handle = spawn(Arc::clone(&monitor), &PolicyConfig::default());
        handle.shutdown().await;

        // No further rotation happens after shutdown.
        monitor.handle_copy(&CopyEvent::text("x".repeat(120)));
        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(monitor.accounting_snapshot().window_bytes_1h, 120);
    }
}
