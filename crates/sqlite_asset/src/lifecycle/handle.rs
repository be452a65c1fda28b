//! Shared handle to the connection cached by the lifecycle manager.

use crate::db::OpenMode;
use log::{debug, info, warn};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cloneable reference to the manager's live connection.
///
/// The connection closes once the manager has released it (see
/// [`AssetDatabase::close`](crate::AssetDatabase::close)) and every clone of
/// the handle has been dropped.
#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    conn: Arc<Mutex<Connection>>,
    mode: OpenMode,
    path: PathBuf,
}

impl DatabaseHandle {
    pub(crate) fn new(conn: Connection, mode: OpenMode, path: PathBuf) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            mode,
            path,
        }
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == OpenMode::ReadOnly
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locks the connection for exclusive use by the caller.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Returns true when both handles share the same connection.
    pub fn same_connection(&self, other: &DatabaseHandle) -> bool {
        Arc::ptr_eq(&self.conn, &other.conn)
    }

    /// Drops the manager's reference, closing the connection if unshared.
    ///
    /// Close failures are logged and ignored.
    pub(crate) fn release(self) {
        let Self { conn, mode, path } = self;
        let conn = match Arc::try_unwrap(conn) {
            Ok(conn) => conn.into_inner(),
            Err(_) => {
                debug!(
                    "event=db_close module=lifecycle status=deferred mode={} path={}",
                    mode.as_str(),
                    path.display()
                );
                return;
            }
        };

        match conn.close() {
            Ok(()) => info!(
                "event=db_close module=lifecycle status=ok mode={} path={}",
                mode.as_str(),
                path.display()
            ),
            Err((_conn, err)) => warn!(
                "event=db_close module=lifecycle status=error mode={} path={} error={}",
                mode.as_str(),
                path.display(),
                err
            ),
        }
    }
}
