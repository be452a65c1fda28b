//! SQLite connection bootstrap, version marker and upgrade application.
//!
//! # Responsibility
//! - Open installed database files in read-write or read-only mode.
//! - Read and stamp the schema version marker.
//! - Apply a resolved upgrade plan atomically.
//!
//! # Invariants
//! - The schema version is tracked via `PRAGMA user_version`.
//! - The marker is stamped in the same transaction as the upgrade scripts.

use crate::asset::AssetError;
use crate::config::ConfigError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod apply;
mod open;
mod version;

pub use apply::{apply_upgrade_plan, ApplyReport};
pub use open::{open_connection, OpenMode};
pub use version::{read_schema_version, write_schema_version};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Bundled asset missing, unreadable, or destination unwritable.
    Asset(AssetError),
    InvalidConfig(ConfigError),
    /// A statement of an upgrade script failed; the transaction rolled back.
    ScriptFailed {
        script: String,
        statement: usize,
        source: rusqlite::Error,
    },
    NoUpgradePath {
        from: u32,
        to: u32,
    },
    DowngradeRejected {
        installed: u32,
        target: u32,
    },
    /// An open was requested while this thread was already initializing.
    RecursiveInitialization,
    ClosedDuringInitialization,
    ReadOnlyVersionMismatch {
        found: u32,
        expected: u32,
        path: PathBuf,
    },
    /// The stored `user_version` is negative and cannot be a schema version.
    InvalidVersionMarker {
        found: i32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Asset(err) => write!(f, "{err}"),
            Self::InvalidConfig(err) => write!(f, "invalid configuration: {err}"),
            Self::ScriptFailed {
                script,
                statement,
                source,
            } => write!(
                f,
                "upgrade script `{script}` failed at statement {statement}: {source}"
            ),
            Self::NoUpgradePath { from, to } => {
                write!(f, "no upgrade script path from {from} to {to}")
            }
            Self::DowngradeRejected { installed, target } => write!(
                f,
                "can't downgrade database from version {installed} to {target}"
            ),
            Self::RecursiveInitialization => write!(f, "database opened recursively during initialization"),
            Self::ClosedDuringInitialization => write!(f, "database closed during initialization"),
            Self::ReadOnlyVersionMismatch {
                found,
                expected,
                path,
            } => write!(
                f,
                "can't upgrade read-only database from version {found} to {expected}: {}",
                path.display()
            ),
            Self::InvalidVersionMarker { found } => {
                write!(f, "stored schema version {found} is not a valid version")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Asset(err) => Some(err),
            Self::InvalidConfig(err) => Some(err),
            Self::ScriptFailed { source, .. } => Some(source),
            Self::NoUpgradePath { .. }
            | Self::DowngradeRejected { .. }
            | Self::RecursiveInitialization
            | Self::ClosedDuringInitialization
            | Self::ReadOnlyVersionMismatch { .. }
            | Self::InvalidVersionMarker { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<AssetError> for DbError {
    fn from(value: AssetError) -> Self {
        Self::Asset(value)
    }
}

impl From<ConfigError> for DbError {
    fn from(value: ConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}
