//! Connection setup and schema migrations for the extraction store.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::DatabaseError;

/// Versioned schema steps, applied in order. A step runs only when its
/// version is above the highest recorded in `schema_version`.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../resources/migrations/001_initial.sql"))];

/// CLI runs against the same file can overlap; wait instead of failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the store file at `path`, creating and migrating it as needed.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    prepare(&conn)?;
    tracing::debug!(path = %path.display(), version = schema_version(&conn), "Store opened");
    Ok(conn)
}

/// In-memory store with the same schema.
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn)?;
    Ok(conn)
}

fn prepare(conn: &Connection) -> Result<(), DatabaseError> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
    run_migrations(conn)
}

/// Apply every migration newer than the recorded schema version.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current = schema_version(conn);

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        tracing::info!(from = current, to = version, "Migrating extraction store");
        conn.execute_batch(sql)
            .map_err(|e| DatabaseError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
    }

    Ok(())
}

/// Highest applied migration, 0 for a fresh file.
pub fn schema_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}
