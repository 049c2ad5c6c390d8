use chrono::{DateTime, Utc};
use tracing::{debug, info};

use clipwatch_core::{
    AccountingRecord, CopyEvent, Decision, ViolationRecord, hours_between,
};

use crate::config::PolicyConfig;
use crate::store::{AccountingStore, ViolationStore};

/// Derived from the persisted violation record; never stored twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Normal,
    Locked,
}

/// Side-effect request produced by a violation, handed to the
/// escalation dispatcher. Sizes stay in bytes here; unit conversion is
/// the dispatcher's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub decision: Decision,
    pub at: DateTime<Utc>,
    pub content: String,
    pub attachment: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyOutcome {
    pub decision: Decision,
    pub escalation: Option<Escalation>,
    /// True when this call's lazy expiry check cleared the cool-down,
    /// so the unlock side effect can be dispatched.
    pub lock_cleared: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryOutcome {
    pub record: ViolationRecord,
    /// True when this check transitioned the engine back to `Normal`.
    pub cleared: bool,
}

/// The policy state machine. Classifies copy events against the 1h and
/// 24h windows and drives the violation lifecycle through the two
/// injected stores. Callers serialize access (see `Monitor`).
pub struct PolicyEngine<A, V> {
    accounting: A,
    violations: V,
    config: PolicyConfig,
    transcript_1h: String,
    transcript_24h: String,
}

impl<A: AccountingStore, V: ViolationStore> PolicyEngine<A, V> {
    pub fn new(accounting: A, violations: V, config: PolicyConfig) -> Self {
        Self {
            accounting,
            violations,
            config,
            transcript_1h: String::new(),
            transcript_24h: String::new(),
        }
    }

    pub fn state(&mut self, now: DateTime<Utc>) -> EngineState {
        if self.violations.check_expiry(now).has_defaulted {
            EngineState::Locked
        } else {
            EngineState::Normal
        }
    }

    /// Current accounting snapshot (rolls the day over if stale).
    pub fn accounting(&mut self, now: DateTime<Utc>) -> AccountingRecord {
        self.accounting.load(now)
    }

    /// Accounts one copy event and decides whether it violates the
    /// policy. While the cool-down is active the event is observed for
    /// the log only; the lock itself is the enforcement.
    pub fn record_copy(&mut self, event: &CopyEvent, now: DateTime<Utc>) -> CopyOutcome {
        info!(
            size_bytes = event.size_bytes,
            kind = ?event.kind,
            "clipboard copy reported"
        );

        let expiry = self.check_expiry(now);
        if expiry.record.has_defaulted {
            debug!("clipboard is locked; copy not accounted");
            return CopyOutcome {
                decision: Decision::Accept,
                escalation: None,
                lock_cleared: false,
            };
        }

        let mut record = self.accounting.load(now);
        let candidate_1h = record.window_bytes_1h.saturating_add(event.size_bytes);
        let candidate_24h = candidate_1h.saturating_add(record.window_bytes_24h);

        let decision = match record.last_copy_at {
            // First copy observed today: a single oversized copy
            // violates immediately.
            None => {
                if candidate_1h >= self.config.limit_1h_bytes {
                    Decision::ViolateWindow1h {
                        cumulative_bytes: candidate_1h,
                    }
                } else {
                    Decision::Accept
                }
            }
            Some(last_copy_at) => {
                let elapsed = hours_between(last_copy_at, now);
                if elapsed <= 1 && candidate_1h >= self.config.limit_1h_bytes {
                    Decision::ViolateWindow1h {
                        cumulative_bytes: candidate_1h,
                    }
                } else if elapsed > 1
                    && elapsed < 24
                    && candidate_24h >= self.config.limit_24h_bytes
                {
                    Decision::ViolateWindow24h {
                        cumulative_bytes: candidate_24h,
                    }
                } else {
                    Decision::Accept
                }
            }
        };

        if !decision.is_violation() {
            record.window_bytes_1h = candidate_1h;
            record.last_copy_at = Some(now);
            self.accounting.persist(&record);
            if let Some(text) = event.payload_text() {
                push_line(&mut self.transcript_1h, text);
            }
            debug!(
                window_bytes_1h = record.window_bytes_1h,
                window_bytes_24h = record.window_bytes_24h,
                "copy accepted"
            );
            return CopyOutcome {
                decision,
                escalation: None,
                lock_cleared: expiry.cleared,
            };
        }

        // Zero the windows before recording the lock: a crash between
        // the two writes loses the lock, never leaves stale counters
        // behind a defaulted record.
        record.clear_windows();
        self.accounting.persist(&record);
        self.violations.persist(&ViolationRecord::defaulted(now));
        let escalation = self.build_escalation(decision, event, now);
        info!(
            cumulative_bytes = decision.cumulative_bytes().unwrap_or(0),
            "copy policy violated; clipboard locked"
        );
        CopyOutcome {
            decision,
            escalation: Some(escalation),
            lock_cleared: expiry.cleared,
        }
    }

    /// Folds the 1h window into the 24h window. Driven by the external
    /// scheduler; a no-op while the cool-down is active. Returns true
    /// when the lazy expiry check cleared the cool-down.
    pub fn rotate_hourly(&mut self, now: DateTime<Utc>) -> bool {
        let expiry = self.check_expiry(now);
        if expiry.record.has_defaulted {
            debug!("rotation skipped while clipboard is locked");
            return false;
        }
        let mut record = self.accounting.load(now);
        record.window_bytes_24h = record.window_bytes_24h.saturating_add(record.window_bytes_1h);
        record.window_bytes_1h = 0;
        record.last_copy_at = Some(now);
        self.accounting.persist(&record);
        if !self.transcript_1h.is_empty() {
            let folded = std::mem::take(&mut self.transcript_1h);
            push_line(&mut self.transcript_24h, &folded);
        }
        debug!(
            window_bytes_24h = record.window_bytes_24h,
            "1h window rotated into 24h window"
        );
        expiry.cleared
    }

    /// Evaluates cool-down expiry, reporting whether this call cleared
    /// the lock so the unlock side effect can be dispatched.
    pub fn check_expiry(&mut self, now: DateTime<Utc>) -> ExpiryOutcome {
        let before = self.violations.load();
        let record = self.violations.check_expiry(now);
        ExpiryOutcome {
            record,
            cleared: before.has_defaulted && !record.has_defaulted,
        }
    }

    fn build_escalation(
        &mut self,
        decision: Decision,
        event: &CopyEvent,
        now: DateTime<Utc>,
    ) -> Escalation {
        let mut content = String::new();
        if matches!(decision, Decision::ViolateWindow24h { .. }) {
            push_line(&mut content, &self.transcript_24h);
        }
        push_line(&mut content, &self.transcript_1h);
        if let Some(text) = event.payload_text() {
            push_line(&mut content, text);
        }
        self.transcript_1h.clear();
        self.transcript_24h.clear();

        let attachment = event.payload_bytes().map(<[u8]>::to_vec);
        if content.is_empty() && attachment.is_some() {
            content.push_str("see attached captured payload");
        }
        Escalation {
            decision,
            at: now,
            content,
            attachment,
        }
    }
}

fn push_line(buffer: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(text);
}
