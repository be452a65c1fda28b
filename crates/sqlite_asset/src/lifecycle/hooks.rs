//! Caller callbacks invoked during database initialization.

use crate::db::OpenMode;
use rusqlite::Connection;

/// Callbacks run by [`AssetDatabase`](crate::AssetDatabase) while it still
/// holds the initialization lock.
///
/// Calling back into the same manager from a hook fails with
/// `DbError::RecursiveInitialization`.
pub trait DatabaseHooks: Send + Sync {
    /// Runs after the database is installed, upgraded and stamped, before
    /// the handle is cached. An error fails the open.
    fn on_open(&self, _conn: &Connection, _mode: OpenMode) -> rusqlite::Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl DatabaseHooks for NoopHooks {}
