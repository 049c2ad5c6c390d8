mod config;
mod intake;
mod sinks;

use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use clipwatch_db::Db;
use clipwatch_policy::{
    EscalationDispatcher, Monitor, PolicyEngine, SqliteStateStore, scheduler,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let load = config::load_or_create().map_err(io::Error::other)?;
    if load.created {
        info!(
            path = %load.paths.config_file.display(),
            "created default config"
        );
    }

    let db_path = load.paths.db_path.clone();
    tokio::task::spawn_blocking(move || setup_db(&db_path))
        .await?
        .map_err(|err| io::Error::other(format!("initialize database: {}", err)))?;

    let engine = PolicyEngine::new(
        SqliteStateStore::new(&load.paths.db_path),
        SqliteStateStore::new(&load.paths.db_path),
        load.config.policy.clone(),
    );
    let dispatcher = EscalationDispatcher::new(
        config::resolve_source_host(&load.config),
        Box::new(sinks::SpoolAlertSink::new(load.paths.spool_dir.clone())),
        Box::new(sinks::MarkerFileLock::new(load.paths.lock_marker.clone())),
    );
    let monitor = Arc::new(Monitor::new(engine, dispatcher));

    info!(
        home = %load.paths.home.display(),
        locked = monitor.is_locked(),
        limit_1h_bytes = load.config.policy.limit_1h_bytes,
        limit_24h_bytes = load.config.policy.limit_24h_bytes,
        "clipwatch agent started"
    );

    let triggers = scheduler::spawn(Arc::clone(&monitor), &load.config.policy);
    intake::run(monitor.as_ref()).await?;
    triggers.shutdown().await;

    info!("clipwatch agent stopped");
    Ok(())
}

fn setup_db(path: &Path) -> clipwatch_db::Result<()> {
    let mut db = Db::open(path)?;
    db.migrate()?;
    Ok(())
}
