use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::engine::Escalation;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

/// Alert handed to the transport collaborator. This is the only place
/// sizes leave the engine's byte unit: reports are in kilobytes.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRequest {
    pub source_host: String,
    pub size_kilobytes: f64,
    pub at: DateTime<Utc>,
    pub content: String,
    #[serde(skip)]
    pub attachment: Option<Vec<u8>>,
}

pub trait AlertSink: Send + Sync {
    fn send(&self, alert: &AlertRequest) -> Result<(), DispatchError>;
}

pub trait ClipboardLock: Send + Sync {
    fn set_locked(&self, locked: bool, since: DateTime<Utc>) -> Result<(), DispatchError>;
}

/// Turns engine decisions into side effects. Both requests are
/// fire-and-forget: a failed alert never suppresses the lock, and
/// neither failure ever rolls back the engine's committed transition.
pub struct EscalationDispatcher {
    source_host: String,
    alerts: Box<dyn AlertSink>,
    lock: Box<dyn ClipboardLock>,
}

impl EscalationDispatcher {
    pub fn new(
        source_host: impl Into<String>,
        alerts: Box<dyn AlertSink>,
        lock: Box<dyn ClipboardLock>,
    ) -> Self {
        Self {
            source_host: source_host.into(),
            alerts,
            lock,
        }
    }

    pub fn dispatch(&self, escalation: &Escalation) {
        let cumulative_bytes = escalation.decision.cumulative_bytes().unwrap_or(0);
        let request = AlertRequest {
            source_host: self.source_host.clone(),
            size_kilobytes: cumulative_bytes as f64 / 1000.0,
            at: escalation.at,
            content: escalation.content.clone(),
            attachment: escalation.attachment.clone(),
        };
        if let Err(err) = self.alerts.send(&request) {
            warn!(error = %err, "failed to dispatch violation alert");
        }
        if let Err(err) = self.lock.set_locked(true, escalation.at) {
            warn!(error = %err, "failed to dispatch clipboard lock");
        }
    }

    pub fn dispatch_unlock(&self, since: DateTime<Utc>) {
        if let Err(err) = self.lock.set_locked(false, since) {
            warn!(error = %err, "failed to dispatch clipboard unlock");
        }
    }
}
