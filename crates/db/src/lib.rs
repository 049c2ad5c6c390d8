use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use clipwatch_core::{AccountingRecord, ViolationRecord};

mod error;

pub use error::{DbError, Result};

const MIGRATION_0001: &str = include_str!("../migrations/0001_init.sql");

const MIGRATIONS: &[(&str, &str)] = &[("0001_init", MIGRATION_0001)];

const DAY_FORMAT: &str = "%Y-%m-%d";

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -20_000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    pub fn migrate(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (_name, sql) in MIGRATIONS {
            tx.execute_batch(sql)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_accounting_state(&self) -> Result<Option<AccountingRecord>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT day, session_start, last_copy_at, window_bytes_1h, window_bytes_24h
                FROM accounting_state WHERE id = 1
                "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((day, session_start, last_copy_at, bytes_1h, bytes_24h)) = row else {
            return Ok(None);
        };
        Ok(Some(AccountingRecord {
            day: parse_day(&day)?,
            session_start: parse_ts(&session_start)?,
            last_copy_at: last_copy_at.as_deref().map(parse_ts).transpose()?,
            window_bytes_1h: bytes_1h.max(0) as u64,
            window_bytes_24h: bytes_24h.max(0) as u64,
        }))
    }

    pub fn put_accounting_state(&self, record: &AccountingRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO accounting_state (
              id, day, session_start, last_copy_at, window_bytes_1h, window_bytes_24h
            ) VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
              day = excluded.day,
              session_start = excluded.session_start,
              last_copy_at = excluded.last_copy_at,
              window_bytes_1h = excluded.window_bytes_1h,
              window_bytes_24h = excluded.window_bytes_24h
            "#,
            params![
                format_day(record.day),
                format_ts(record.session_start),
                record.last_copy_at.map(format_ts),
                record.window_bytes_1h as i64,
                record.window_bytes_24h as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_violation_state(&self) -> Result<Option<ViolationRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT has_defaulted, time_defaulted FROM violation_state WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                    ))
                },
            )
            .optional()?;
        let Some((has_defaulted, time_defaulted)) = row else {
            return Ok(None);
        };
        let has_defaulted = has_defaulted != 0;
        let time_defaulted = time_defaulted.as_deref().map(parse_ts).transpose()?;
        // A cleared record never carries a violation time, and a defaulted
        // record without one is unenforceable; normalize both to the
        // cleared state rather than hand out a lock that can never expire.
        let record = match (has_defaulted, time_defaulted) {
            (true, Some(at)) => ViolationRecord::defaulted(at),
            _ => ViolationRecord::default(),
        };
        Ok(Some(record))
    }

    pub fn put_violation_state(&self, record: &ViolationRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO violation_state (id, has_defaulted, time_defaulted)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
              has_defaulted = excluded.has_defaulted,
              time_defaulted = excluded.time_defaulted
            "#,
            params![
                record.has_defaulted as i64,
                record.time_defaulted.map(format_ts),
            ],
        )?;
        Ok(())
    }
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

pub fn parse_day(value: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(value, DAY_FORMAT)?)
}
