use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a clipboard capture reported by the capture hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyKind {
    Text,
    Image,
    FileSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CopyPayload {
    Text(String),
    Bytes(Vec<u8>),
}

/// A single reported clipboard capture. Consumed once by the policy
/// engine; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyEvent {
    pub kind: CopyKind,
    pub size_bytes: u64,
    pub payload: CopyPayload,
}

impl CopyEvent {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            kind: CopyKind::Text,
            size_bytes: value.len() as u64,
            payload: CopyPayload::Text(value),
        }
    }

    pub fn payload_text(&self) -> Option<&str> {
        match &self.payload {
            CopyPayload::Text(text) => Some(text),
            CopyPayload::Bytes(_) => None,
        }
    }

    pub fn payload_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            CopyPayload::Text(_) => None,
            CopyPayload::Bytes(bytes) => Some(bytes),
        }
    }
}

/// Outcome of accounting one copy event. Violations carry the
/// cumulative window size that crossed the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Accept,
    ViolateWindow1h { cumulative_bytes: u64 },
    ViolateWindow24h { cumulative_bytes: u64 },
}

impl Decision {
    pub fn is_violation(&self) -> bool {
        !matches!(self, Decision::Accept)
    }

    pub fn cumulative_bytes(&self) -> Option<u64> {
        match self {
            Decision::Accept => None,
            Decision::ViolateWindow1h { cumulative_bytes }
            | Decision::ViolateWindow24h { cumulative_bytes } => Some(*cumulative_bytes),
        }
    }
}

/// Daily copy-volume accounting. One current record; a fresh one is
/// created whenever the calendar day changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingRecord {
    pub day: NaiveDate,
    pub session_start: DateTime<Utc>,
    pub last_copy_at: Option<DateTime<Utc>>,
    pub window_bytes_1h: u64,
    pub window_bytes_24h: u64,
}

impl AccountingRecord {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            day: now.date_naive(),
            session_start: now,
            last_copy_at: None,
            window_bytes_1h: 0,
            window_bytes_24h: 0,
        }
    }

    /// Zeroes both windows in place, keeping the day and session start.
    pub fn clear_windows(&mut self) {
        self.window_bytes_1h = 0;
        self.window_bytes_24h = 0;
        self.last_copy_at = None;
    }
}

/// Violation cool-down state. Survives restarts and day rollovers;
/// cleared only once a full calendar day has passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub has_defaulted: bool,
    pub time_defaulted: Option<DateTime<Utc>>,
}

impl ViolationRecord {
    pub fn defaulted(at: DateTime<Utc>) -> Self {
        Self {
            has_defaulted: true,
            time_defaulted: Some(at),
        }
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        match self.time_defaulted {
            Some(defaulted) if self.has_defaulted => {
                days_between(defaulted.date_naive(), now.date_naive()) >= 1
            }
            _ => false,
        }
    }
}

/// Whole hours elapsed from `t1` to `t2`, floored (negative spans floor
/// downward, so -30 minutes is -1).
pub fn hours_between(t1: DateTime<Utc>, t2: DateTime<Utc>) -> i64 {
    (t2 - t1).num_seconds().div_euclid(3600)
}

/// Absolute difference between two dates in whole calendar days. Used
/// for cool-down expiry only; window accounting works on hours.
pub fn days_between(d1: NaiveDate, d2: NaiveDate) -> i64 {
    (d2 - d1).num_days().abs()
}
