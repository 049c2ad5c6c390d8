use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use clipwatch_core::{AccountingRecord, CopyEvent, Decision};

use crate::engine::PolicyEngine;
use crate::escalation::EscalationDispatcher;
use crate::store::{AccountingStore, ViolationStore};

/// Serialized front door to the policy engine. Every entry point takes
/// the engine mutex for the whole read-modify-write, so two concurrent
/// copy events can never both read the same window counter. Side
/// effects are dispatched after the lock is released.
pub struct Monitor<A, V> {
    engine: Mutex<PolicyEngine<A, V>>,
    dispatcher: EscalationDispatcher,
}

impl<A: AccountingStore, V: ViolationStore> Monitor<A, V> {
    pub fn new(engine: PolicyEngine<A, V>, dispatcher: EscalationDispatcher) -> Self {
        Self {
            engine: Mutex::new(engine),
            dispatcher,
        }
    }

    // Every engine mutation is write-through to the stores, so a
    // poisoned mutex holds nothing worth discarding.
    fn engine(&self) -> MutexGuard<'_, PolicyEngine<A, V>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn handle_copy(&self, event: &CopyEvent) -> Decision {
        let now = Utc::now();
        let outcome = self.engine().record_copy(event, now);
        if outcome.lock_cleared {
            self.dispatcher.dispatch_unlock(now);
        }
        if let Some(escalation) = &outcome.escalation {
            self.dispatcher.dispatch(escalation);
        }
        outcome.decision
    }

    pub fn rotate_windows(&self) {
        let now = Utc::now();
        if self.engine().rotate_hourly(now) {
            self.dispatcher.dispatch_unlock(now);
        }
    }

    pub fn run_expiry_check(&self) {
        let now = Utc::now();
        let outcome = self.engine().check_expiry(now);
        if outcome.cleared {
            self.dispatcher.dispatch_unlock(now);
        }
    }

    pub fn is_locked(&self) -> bool {
        let now = Utc::now();
        let outcome = self.engine().check_expiry(now);
        if outcome.cleared {
            self.dispatcher.dispatch_unlock(now);
        }
        outcome.record.has_defaulted
    }

    pub fn accounting_snapshot(&self) -> AccountingRecord {
        self.engine().accounting(Utc::now())
    }
}
