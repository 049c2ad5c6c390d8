use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use clipwatch_core::{AccountingRecord, ViolationRecord};
use clipwatch_db::Db;

/// Durable home of the daily accounting record.
///
/// Implementations provide raw fetch/persist; `load` layers the daily
/// rollover on top. Neither side ever surfaces a storage failure to the
/// engine: a broken read degrades to "no record", a broken write is
/// logged and dropped.
pub trait AccountingStore {
    fn fetch(&mut self) -> Option<AccountingRecord>;
    fn persist(&mut self, record: &AccountingRecord);

    /// Returns today's record, replacing it with a fresh zeroed one
    /// whenever the stored day is not the current calendar day.
    fn load(&mut self, now: DateTime<Utc>) -> AccountingRecord {
        match self.fetch() {
            Some(record) if record.day == now.date_naive() => record,
            stale => {
                if let Some(previous) = stale {
                    info!(previous_day = %previous.day, "accounting day rolled over");
                }
                let fresh = AccountingRecord::fresh(now);
                self.persist(&fresh);
                fresh
            }
        }
    }
}

/// Durable home of the violation cool-down record.
pub trait ViolationStore {
    fn fetch(&mut self) -> Option<ViolationRecord>;
    fn persist(&mut self, record: &ViolationRecord);

    fn load(&mut self) -> ViolationRecord {
        self.fetch().unwrap_or_default()
    }

    /// Lazily clears the cool-down once at least one full calendar day
    /// has passed since the violation. Idempotent.
    fn check_expiry(&mut self, now: DateTime<Utc>) -> ViolationRecord {
        let record = self.load();
        if record.expired(now) {
            let cleared = ViolationRecord::default();
            self.persist(&cleared);
            info!("clipboard cool-down expired; violation record cleared");
            return cleared;
        }
        record
    }
}

/// SQLite-backed store. Opens the database per operation against an
/// already-migrated file; open or read failures degrade to defaults.
pub struct SqliteStateStore {
    db_path: PathBuf,
}

impl SqliteStateStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn open(&self) -> Option<Db> {
        match Db::open(&self.db_path) {
            Ok(db) => Some(db),
            Err(err) => {
                warn!(
                    error = %err,
                    path = %self.db_path.display(),
                    "failed to open state database"
                );
                None
            }
        }
    }
}

impl AccountingStore for SqliteStateStore {
    fn fetch(&mut self) -> Option<AccountingRecord> {
        let db = self.open()?;
        match db.get_accounting_state() {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "failed to read accounting state; starting fresh");
                None
            }
        }
    }

    fn persist(&mut self, record: &AccountingRecord) {
        let Some(db) = self.open() else {
            return;
        };
        if let Err(err) = db.put_accounting_state(record) {
            warn!(error = %err, "failed to persist accounting state");
        }
    }
}

impl ViolationStore for SqliteStateStore {
    fn fetch(&mut self) -> Option<ViolationRecord> {
        let db = self.open()?;
        match db.get_violation_state() {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "failed to read violation state; assuming clear");
                None
            }
        }
    }

    fn persist(&mut self, record: &ViolationRecord) {
        let Some(db) = self.open() else {
            return;
        };
        if let Err(err) = db.put_violation_state(record) {
            warn!(error = %err, "failed to persist violation state");
        }
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    accounting: Option<AccountingRecord>,
    violation: Option<ViolationRecord>,
}

impl AccountingStore for MemoryStateStore {
    fn fetch(&mut self) -> Option<AccountingRecord> {
        self.accounting
    }

    fn persist(&mut self, record: &AccountingRecord) {
        self.accounting = Some(*record);
    }
}

impl ViolationStore for MemoryStateStore {
    fn fetch(&mut self) -> Option<ViolationRecord> {
        self.violation
    }

    fn persist(&mut self, record: &ViolationRecord) {
        self.violation = Some(*record);
    }
}
