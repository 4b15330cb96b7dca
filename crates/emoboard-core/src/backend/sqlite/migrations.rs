//! Schema migrations for the local board database.

use super::schema;
use rusqlite::{Connection, types::Type};

/// Version a freshly migrated board file ends up at.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[(1, schema::MIGRATION_V1_SQL), (2, schema::MIGRATION_V2_SQL)];

/// The file's `user_version`.
///
/// # Errors
///
/// Query failure, or a negative or oversized stored version.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e)))
}

/// Bring the file up to [`LATEST_SCHEMA_VERSION`]. Returns the version
/// reached.
///
/// Each step commits on its own, so a failure leaves the file at the last
/// good version.
///
/// # Errors
///
/// The first failing step's error.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let start = current_schema_version(conn)?;
    let mut current = start;
    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > start) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(version))?;
        tx.execute(
            "UPDATE board_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(version)],
        )?;
        tx.commit()?;
        tracing::debug!(version, "board schema migrated");
        current = version;
    }

    Ok(current)
}
