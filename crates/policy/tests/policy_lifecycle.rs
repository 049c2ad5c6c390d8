use chrono::{DateTime, TimeZone, Utc};
use clipwatch_core::{CopyEvent, Decision};
use clipwatch_db::Db;
use clipwatch_policy::{
    EngineState, MemoryStateStore, PolicyConfig, PolicyEngine, SqliteStateStore,
};
use std::path::{Path, PathBuf};

fn setup_db(dir: &tempfile::TempDir) -> PathBuf {
    let db_path = dir.path().join("clipwatch.sqlite");
    let mut db = Db::open(&db_path).expect("open db");
    db.migrate().expect("migrate db");
    db_path
}

fn sqlite_engine(db_path: &Path) -> PolicyEngine<SqliteStateStore, SqliteStateStore> {
    PolicyEngine::new(
        SqliteStateStore::new(db_path),
        SqliteStateStore::new(db_path),
        PolicyConfig::default(),
    )
}

fn ts(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, d, h, mi, 0).unwrap()
}

fn sized_text(size: usize) -> CopyEvent {
    CopyEvent::text("x".repeat(size))
}

#[test]
fn accepted_copies_survive_a_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = setup_db(&dir);

    let now = ts(1, 9, 0);
    {
        let mut engine = sqlite_engine(&db_path);
        assert_eq!(
            engine.record_copy(&sized_text(100), now).decision,
            Decision::Accept
        );
    }

    // A fresh process sees field-identical accounting.
    let mut engine = sqlite_engine(&db_path);
    let record = engine.accounting(ts(1, 9, 5));
    assert_eq!(record.window_bytes_1h, 100);
    assert_eq!(record.window_bytes_24h, 0);
    assert_eq!(record.last_copy_at, Some(now));
    assert_eq!(record.day, now.date_naive());

    let stored = Db::open(&db_path)
        .expect("open db")
        .get_accounting_state()
        .expect("get accounting")
        .expect("accounting present");
    assert_eq!(stored, record);
}

#[test]
fn violation_lifecycle_across_restarts() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = setup_db(&dir);

    {
        let mut engine = sqlite_engine(&db_path);
        let decisions: Vec<Decision> = [ts(1, 9, 0), ts(1, 9, 10), ts(1, 9, 20)]
            .iter()
            .map(|now| engine.record_copy(&sized_text(200), *now).decision)
            .collect();
        assert_eq!(
            decisions,
            vec![
                Decision::Accept,
                Decision::Accept,
                Decision::ViolateWindow1h {
                    cumulative_bytes: 600
                },
            ]
        );
    }

    // Still locked after a restart, with zeroed windows on disk.
    let mut engine = sqlite_engine(&db_path);
    assert_eq!(engine.state(ts(1, 10, 0)), EngineState::Locked);
    let record = engine.accounting(ts(1, 10, 0));
    assert_eq!(record.window_bytes_1h, 0);
    assert_eq!(record.window_bytes_24h, 0);

    // The cool-down clears on the next calendar day and persists.
    let outcome = engine.check_expiry(ts(2, 9, 0));
    assert!(outcome.cleared);
    drop(engine);

    let mut engine = sqlite_engine(&db_path);
    assert_eq!(engine.state(ts(2, 9, 5)), EngineState::Normal);
    let stored = Db::open(&db_path)
        .expect("open db")
        .get_violation_state()
        .expect("get violation")
        .expect("violation present");
    assert!(!stored.has_defaulted);
    assert_eq!(stored.time_defaulted, None);
}

#[test]
fn rotation_is_durable() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = setup_db(&dir);

    {
        let mut engine = sqlite_engine(&db_path);
        engine.record_copy(&sized_text(300), ts(1, 9, 0));
        engine.rotate_hourly(ts(1, 10, 0));
    }

    let mut engine = sqlite_engine(&db_path);
    let record = engine.accounting(ts(1, 10, 5));
    assert_eq!(record.window_bytes_1h, 0);
    assert_eq!(record.window_bytes_24h, 300);
    assert_eq!(record.last_copy_at, Some(ts(1, 10, 0)));
}

#[test]
fn sqlite_and_memory_stores_agree_on_the_scenario() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = setup_db(&dir);
    let mut sqlite = sqlite_engine(&db_path);
    let mut memory = PolicyEngine::new(
        MemoryStateStore::default(),
        MemoryStateStore::default(),
        PolicyConfig::default(),
    );

    for (i, now) in [ts(1, 9, 0), ts(1, 9, 10), ts(1, 9, 20)].iter().enumerate() {
        let event = sized_text(200);
        let from_sqlite = sqlite.record_copy(&event, *now).decision;
        let from_memory = memory.record_copy(&event, *now).decision;
        assert_eq!(from_sqlite, from_memory, "event {}", i);
    }
}
