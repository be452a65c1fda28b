//! Connection bootstrap for installed database files.
//!
//! # Responsibility
//! - Open an existing database file with the requested access mode.
//! - Configure connection settings required by the lifecycle manager.
//!
//! # Invariants
//! - Never creates a database file; missing files are an open error.
//!
//! # See also
//! - `lifecycle::manager` for when each mode is used.

use super::DbResult;
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

/// Access mode of an open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadWrite,
    ReadOnly,
}

impl OpenMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadWrite => "read_write",
            Self::ReadOnly => "read_only",
        }
    }

    fn flags(self) -> OpenFlags {
        let access = match self {
            Self::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            Self::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
        };
        access | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
    }
}

/// Opens the database file at `path` in `mode`.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(path: &Path, mode: OpenMode, busy_timeout: Duration) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode={} path={}",
        mode.as_str(),
        path.display()
    );

    let result = Connection::open_with_flags(path, mode.flags()).and_then(|conn| {
        conn.busy_timeout(busy_timeout)?;
        Ok(conn)
    });

    match result {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode.as_str(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}
