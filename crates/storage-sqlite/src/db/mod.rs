//! Connection pool, migrations, and timestamp formatting helpers.

pub mod write_actor;

pub use write_actor::{spawn_writer, WriteHandle};

use crate::errors::StorageError;
use chrono::{DateTime, SecondsFormat, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::Path;
use std::sync::Arc;
use taskdeck_core::errors::Result;

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;
pub type SqlitePooledConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const DB_FILENAME: &str = "taskdeck.db";

/// Pragmas applied to every checked-out connection. WAL keeps readers open
/// while the writer thread commits; the busy timeout covers the window where
/// a reader and the writer contend on the same page.
#[derive(Debug)]
struct ConnectionPragmas;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionPragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON; \
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(r2d2::Error::QueryError)
    }
}

/// Ensure the app data directory exists and return the database path.
pub fn init(app_data_dir: &str) -> Result<String> {
    std::fs::create_dir_all(app_data_dir).map_err(|e| {
        StorageError::Migration(format!("Could not create data dir {}: {}", app_data_dir, e))
    })?;
    let db_path = Path::new(app_data_dir).join(DB_FILENAME);
    Ok(db_path.to_string_lossy().to_string())
}

pub fn run_migrations(db_path: &str) -> Result<()> {
    let mut conn = SqliteConnection::establish(db_path).map_err(StorageError::from)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    Ok(())
}

pub fn create_pool(db_path: &str) -> Result<Arc<SqlitePool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(8)
        .connection_customizer(Box::new(ConnectionPragmas))
        .build(manager)
        .map_err(|e| StorageError::Pool(e.to_string()))?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &Arc<SqlitePool>) -> Result<SqlitePooledConnection> {
    Ok(pool.get().map_err(|e| StorageError::Pool(e.to_string()))?)
}

// ── Enum column format ──────────────────────────────────────────────────────
//
// Status enums are stored as their serde string form, so the database value
// matches the wire value exactly.

pub(crate) fn enum_to_db<T: serde::Serialize>(
    value: &T,
) -> std::result::Result<String, StorageError> {
    Ok(serde_json::to_string(value)
        .map_err(|e| StorageError::CorruptRow(format!("Unserializable enum: {}", e)))?
        .trim_matches('"')
        .to_string())
}

pub(crate) fn enum_from_db<T: serde::de::DeserializeOwned>(
    value: &str,
) -> std::result::Result<T, StorageError> {
    serde_json::from_str(&format!("\"{}\"", value))
        .map_err(|e| StorageError::CorruptRow(format!("Bad enum value '{}': {}", value, e)))
}

// ── Timestamp column format ─────────────────────────────────────────────────
//
// Timestamps are stored as RFC-3339 TEXT with millisecond precision and a
// trailing Z, which keeps lexicographic and chronological order identical.

pub(crate) fn format_ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn format_opt_ts(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(format_ts)
}

pub(crate) fn parse_ts(value: &str) -> std::result::Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptRow(format!("Bad timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_opt_ts(
    value: Option<&str>,
) -> std::result::Result<Option<DateTime<Utc>>, StorageError> {
    value.map(parse_ts).transpose()
}
