//! Create-or-upgrade-or-open orchestration for one bundled database.
//!
//! # Responsibility
//! - Install the bundled database on first use.
//! - Replace or upgrade an installed database whose version is stale.
//! - Cache exactly one live connection and hand out shared handles to it.
//!
//! # Invariants
//! - At most one cached handle exists per manager.
//! - State moves `Closed -> Initializing -> Open(mode) -> Closed`; the same
//!   thread re-entering while `Initializing` fails fast, other threads wait.
//! - A failed or panicking initialization restores the previously cached
//!   handle.
//! - A forced replacement is fully written before the installed file is
//!   touched; a missing or corrupt asset leaves the installed file intact.

use super::handle::DatabaseHandle;
use super::hooks::{DatabaseHooks, NoopHooks};
use crate::asset::{AssetError, ResourceStore};
use crate::config::{AssetDbConfig, DowngradePolicy};
use crate::db::{
    apply_upgrade_plan, open_connection, read_schema_version, write_schema_version, DbError,
    DbResult, OpenMode,
};
use crate::upgrade::{UpgradeCatalog, UpgradeScript};
use log::{error, info, warn};
use parking_lot::ReentrantMutex;
use rusqlite::Connection;
use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];
const REPLACEMENT_SUFFIX: &str = ".replacement";

enum HandleState {
    Closed,
    Initializing,
    Open(DatabaseHandle),
}

/// Lifecycle manager for a database shipped inside application assets.
///
/// Opening may copy, decompress and upgrade the database file; these are
/// blocking operations and should not run on a latency-sensitive thread.
pub struct AssetDatabase {
    config: AssetDbConfig,
    store: Arc<dyn ResourceStore>,
    hooks: Arc<dyn DatabaseHooks>,
    forced_upgrade_version: AtomicU32,
    state: ReentrantMutex<RefCell<HandleState>>,
}

impl AssetDatabase {
    /// Creates a manager. Nothing is opened until the first open call.
    ///
    /// # Errors
    /// - `DbError::InvalidConfig` when `config` fails validation.
    pub fn new(config: AssetDbConfig, store: impl ResourceStore + 'static) -> DbResult<Self> {
        Self::with_shared_store(config, Arc::new(store))
    }

    pub fn with_shared_store(config: AssetDbConfig, store: Arc<dyn ResourceStore>) -> DbResult<Self> {
        config.validate()?;
        Ok(Self {
            forced_upgrade_version: AtomicU32::new(config.forced_upgrade_version),
            config,
            store,
            hooks: Arc::new(NoopHooks),
            state: ReentrantMutex::new(RefCell::new(HandleState::Closed)),
        })
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn DatabaseHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &AssetDbConfig {
        &self.config
    }

    /// Replaces instead of upgrading installed databases below `version`.
    ///
    /// `version` should not exceed the target version.
    pub fn set_forced_upgrade_threshold(&self, version: u32) {
        self.forced_upgrade_version.store(version, Ordering::SeqCst);
    }

    /// Replaces instead of upgrading any installed database older than the
    /// target version.
    pub fn set_forced_upgrade_always(&self) {
        self.set_forced_upgrade_threshold(self.config.version);
    }

    pub fn forced_upgrade_threshold(&self) -> u32 {
        self.forced_upgrade_version.load(Ordering::SeqCst)
    }

    /// Mode of the cached handle, or `None` when nothing is open.
    pub fn open_mode(&self) -> Option<OpenMode> {
        let guard = self.state.lock();
        let state = guard.borrow();
        match &*state {
            HandleState::Open(handle) => Some(handle.mode()),
            HandleState::Closed | HandleState::Initializing => None,
        }
    }

    /// Returns the read-write handle, installing or upgrading the file first
    /// when needed.
    ///
    /// # Errors
    /// - `DbError::Asset` when the bundled database is missing or the storage
    ///   directory is not writable.
    /// - `DbError::NoUpgradePath` when no script chain reaches the target.
    /// - `DbError::DowngradeRejected` when the installed file is newer and the
    ///   policy is `Reject`.
    /// - `DbError::RecursiveInitialization` when called from a hook.
    pub fn open_for_write(&self) -> DbResult<DatabaseHandle> {
        let guard = self.state.lock();
        {
            let state = guard.borrow();
            match &*state {
                HandleState::Open(handle) if handle.mode() == OpenMode::ReadWrite => {
                    return Ok(handle.clone());
                }
                HandleState::Initializing => {
                    error!("event=db_lifecycle module=lifecycle status=error mode=read_write error_code=recursive_initialization");
                    return Err(DbError::RecursiveInitialization);
                }
                HandleState::Open(_) | HandleState::Closed => {}
            }
        }

        let initializing = InitializationGuard::begin(&guard);
        initializing.finish(self.initialize_writable())
    }

    /// Returns the cached handle, or opens one.
    ///
    /// Falls back to a read-only connection when the read-write path fails,
    /// provided the installed file is already at the target version.
    ///
    /// # Errors
    /// - `DbError::ReadOnlyVersionMismatch` when the fallback finds a stale
    ///   version it cannot upgrade.
    /// - The read-write error when no installed file exists to fall back to.
    pub fn open_for_read(&self) -> DbResult<DatabaseHandle> {
        let guard = self.state.lock();
        {
            let state = guard.borrow();
            match &*state {
                HandleState::Open(handle) => return Ok(handle.clone()),
                HandleState::Initializing => {
                    error!("event=db_lifecycle module=lifecycle status=error mode=read_only error_code=recursive_initialization");
                    return Err(DbError::RecursiveInitialization);
                }
                HandleState::Closed => {}
            }
        }

        let write_error = match self.open_for_write() {
            Ok(handle) => return Ok(handle),
            Err(err) => err,
        };
        warn!(
            "event=db_lifecycle module=lifecycle status=fallback database={} mode=read_only error={}",
            self.config.database_name, write_error
        );

        let initializing = InitializationGuard::begin(&guard);
        initializing.finish(self.initialize_read_only(write_error))
    }

    /// Releases the cached handle.
    ///
    /// Outstanding handle clones keep the connection alive until dropped.
    ///
    /// # Errors
    /// - `DbError::ClosedDuringInitialization` when called from a hook.
    pub fn close(&self) -> DbResult<()> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        match std::mem::replace(&mut *state, HandleState::Closed) {
            HandleState::Initializing => {
                *state = HandleState::Initializing;
                error!("event=db_close module=lifecycle status=error error_code=closed_during_initialization");
                Err(DbError::ClosedDuringInitialization)
            }
            HandleState::Open(handle) => {
                drop(state);
                handle.release();
                Ok(())
            }
            HandleState::Closed => Ok(()),
        }
    }

    fn initialize_writable(&self) -> DbResult<DatabaseHandle> {
        let started_at = Instant::now();
        let path = self.config.database_path();
        let target = self.config.version;
        info!(
            "event=db_lifecycle module=lifecycle status=start mode=read_write database={} target_version={target}",
            self.config.database_name
        );

        let result = self.prepare_writable(&path, target).and_then(|conn| {
            self.hooks.on_open(&conn, OpenMode::ReadWrite)?;
            Ok(conn)
        });

        match result {
            Ok(conn) => {
                info!(
                    "event=db_lifecycle module=lifecycle status=ok mode=read_write database={} duration_ms={}",
                    self.config.database_name,
                    started_at.elapsed().as_millis()
                );
                Ok(DatabaseHandle::new(conn, OpenMode::ReadWrite, path))
            }
            Err(err) => {
                error!(
                    "event=db_lifecycle module=lifecycle status=error mode=read_write database={} duration_ms={} error={}",
                    self.config.database_name,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn prepare_writable(&self, path: &Path, target: u32) -> DbResult<Connection> {
        let busy_timeout = self.config.busy_timeout();
        let mut installed_fresh = false;
        if !path.exists() {
            self.materialize()?;
            installed_fresh = true;
        }

        let mut conn = open_connection(path, OpenMode::ReadWrite, busy_timeout)?;
        let mut installed = read_schema_version(&conn)?;

        let threshold = self.forced_upgrade_threshold();
        if !installed_fresh && installed != 0 && installed < threshold {
            warn!(
                "event=forced_upgrade module=lifecycle status=start database={} installed_version={installed} threshold={threshold} target_version={target}",
                self.config.database_name
            );
            let replacement =
                self.materialize_as(&replacement_file_name(&self.config.database_name))?;
            close_quietly(conn, path);
            swap_in_replacement(&replacement, path)?;
            conn = open_connection(path, OpenMode::ReadWrite, busy_timeout)?;
            installed = read_schema_version(&conn)?;
            installed_fresh = true;
        }

        if installed_fresh || installed == 0 {
            if installed != target {
                write_schema_version(&conn, target)?;
            }
        } else if installed != target {
            self.upgrade(&mut conn, installed, target)?;
        }
        Ok(conn)
    }

    fn upgrade(&self, conn: &mut Connection, installed: u32, target: u32) -> DbResult<()> {
        let catalog = UpgradeCatalog::new(
            self.store.as_ref(),
            &self.config.asset_root,
            &self.config.database_name,
        );

        let plan = if installed > target {
            match self.config.downgrade_policy {
                DowngradePolicy::Reject => {
                    error!(
                        "event=upgrade_resolve module=lifecycle status=error database={} from={installed} to={target} error_code=downgrade_rejected",
                        self.config.database_name
                    );
                    return Err(DbError::DowngradeRejected { installed, target });
                }
                DowngradePolicy::AttemptUpgrade => {
                    warn!(
                        "event=upgrade_resolve module=lifecycle status=downgrade database={} from={installed} to={target}",
                        self.config.database_name
                    );
                    catalog.discover(installed, target)
                }
            }
        } else {
            catalog.resolve(installed, target)
        };

        if plan.is_empty() {
            error!(
                "event=upgrade_resolve module=lifecycle status=error database={} from={installed} to={target} available=[{}] error_code=no_upgrade_path",
                self.config.database_name,
                join_scripts(&catalog.available())
            );
            return Err(DbError::NoUpgradePath {
                from: installed,
                to: target,
            });
        }

        warn!(
            "event=upgrade_apply module=lifecycle status=start database={} from={installed} to={target} plan=[{}]",
            self.config.database_name,
            join_scripts(plan.scripts())
        );
        apply_upgrade_plan(
            conn,
            &plan,
            target,
            &catalog,
            self.config.statement_terminator,
        )?;
        Ok(())
    }

    fn initialize_read_only(&self, write_error: DbError) -> DbResult<DatabaseHandle> {
        let path = self.config.database_path();
        if !path.is_file() {
            return Err(write_error);
        }

        let conn = open_connection(&path, OpenMode::ReadOnly, self.config.busy_timeout())?;
        let found = read_schema_version(&conn)?;
        if found != self.config.version {
            error!(
                "event=db_lifecycle module=lifecycle status=error mode=read_only database={} found_version={found} target_version={} error_code=read_only_version_mismatch",
                self.config.database_name, self.config.version
            );
            return Err(DbError::ReadOnlyVersionMismatch {
                found,
                expected: self.config.version,
                path,
            });
        }

        self.hooks.on_open(&conn, OpenMode::ReadOnly)?;
        warn!(
            "event=db_lifecycle module=lifecycle status=ok mode=read_only database={}",
            self.config.database_name
        );
        Ok(DatabaseHandle::new(conn, OpenMode::ReadOnly, path))
    }

    fn materialize(&self) -> DbResult<()> {
        self.materialize_as(&self.config.database_name)?;
        Ok(())
    }

    fn materialize_as(&self, file_name: &str) -> DbResult<PathBuf> {
        let dest = self.store.materialize(
            &self.config.database_asset_name(),
            &self.config.storage_dir,
            file_name,
        )?;
        Ok(dest)
    }
}

/// Marks the manager as initializing until `finish` runs.
///
/// Dropped without `finish` (a panicking hook or store), it restores the
/// previously cached handle so the manager stays usable.
struct InitializationGuard<'a> {
    state: &'a RefCell<HandleState>,
    previous: Option<DatabaseHandle>,
    finished: bool,
}

impl<'a> InitializationGuard<'a> {
    fn begin(state: &'a RefCell<HandleState>) -> Self {
        let replaced = std::mem::replace(&mut *state.borrow_mut(), HandleState::Initializing);
        let previous = match replaced {
            HandleState::Open(handle) => Some(handle),
            HandleState::Closed | HandleState::Initializing => None,
        };
        Self {
            state,
            previous,
            finished: false,
        }
    }

    fn finish(mut self, outcome: DbResult<DatabaseHandle>) -> DbResult<DatabaseHandle> {
        self.finished = true;
        let previous = self.previous.take();
        match outcome {
            Ok(handle) => {
                *self.state.borrow_mut() = HandleState::Open(handle.clone());
                if let Some(previous) = previous {
                    previous.release();
                }
                Ok(handle)
            }
            Err(err) => {
                *self.state.borrow_mut() = previous.map_or(HandleState::Closed, HandleState::Open);
                Err(err)
            }
        }
    }
}

impl Drop for InitializationGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        error!("event=db_lifecycle module=lifecycle status=error error_code=initialization_panicked");
        if let Ok(mut state) = self.state.try_borrow_mut() {
            *state = self
                .previous
                .take()
                .map_or(HandleState::Closed, HandleState::Open);
        }
    }
}

fn close_quietly(conn: Connection, path: &Path) {
    if let Err((_conn, err)) = conn.close() {
        warn!(
            "event=db_close module=lifecycle status=error path={} error={}",
            path.display(),
            err
        );
    }
}

fn replacement_file_name(database_name: &str) -> String {
    format!("{database_name}{REPLACEMENT_SUFFIX}")
}

/// Moves a fully written replacement over the installed file.
///
/// Sidecar journals of the old file are removed first so they are never
/// replayed against the new one. On failure the replacement is discarded.
fn swap_in_replacement(replacement: &Path, path: &Path) -> DbResult<()> {
    let result = remove_sidecars(path).and_then(|()| {
        fs::rename(replacement, path).map_err(|source| {
            DbError::from(AssetError::Unwritable {
                path: path.to_path_buf(),
                source,
            })
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(replacement);
    }
    result
}

fn remove_sidecars(path: &Path) -> DbResult<()> {
    for suffix in SIDECAR_SUFFIXES {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        remove_if_exists(Path::new(&sidecar))?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> DbResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(AssetError::Unwritable {
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}

fn join_scripts(scripts: &[UpgradeScript]) -> String {
    scripts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
