//! Schema version marker stored in the database header.

use super::{DbError, DbResult};
use rusqlite::Connection;

/// Reads the stored schema version; `0` means the file was never stamped.
///
/// # Errors
/// - `DbError::InvalidVersionMarker` when the stored value is negative.
pub fn read_schema_version(conn: &Connection) -> DbResult<u32> {
    let stored = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, i32>(0))?;
    u32::try_from(stored).map_err(|_| DbError::InvalidVersionMarker { found: stored })
}

/// Stamps the schema version.
///
/// Inside an open transaction the write commits or rolls back with it.
pub fn write_schema_version(conn: &Connection, version: u32) -> DbResult<()> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))?;
    Ok(())
}
