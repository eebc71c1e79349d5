use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

/// Builds the shared pool without touching the file yet. Connections are
/// opened on first use, so a missing or locked database shows up as a
/// per-request store error instead of preventing startup.
pub fn connect_lazy(config: &DatabaseConfig) -> SqlitePool {
    info!(path = %config.path.display(), "Configuring SQLite store");

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(config.busy_timeout_seconds))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .connect_lazy_with(options)
}
