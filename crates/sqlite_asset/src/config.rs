//! Configuration for one bundled asset database.
//!
//! # Responsibility
//! - Describe where the bundled database lives and where it is installed.
//! - Validate naming and version inputs before any file-system work.
//!
//! # Invariants
//! - `version` is between 1 and `i32::MAX`, the range `PRAGMA user_version`
//!   can hold.
//! - `database_name` is a plain file name (no path separators).
//! - `asset_root` never climbs out of the store with `..` segments.

use crate::script::DEFAULT_STATEMENT_TERMINATOR;
use crate::upgrade::{database_asset_name, DEFAULT_ASSET_ROOT};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const STORAGE_SUBDIR: &str = "databases";
const MAX_VERSION: u32 = i32::MAX as u32;

/// What to do when the installed database is newer than the target version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DowngradePolicy {
    /// Fail the open with `DbError::DowngradeRejected`.
    #[default]
    Reject,
    /// Log a warning and run whatever scripts the backward walk finds for the
    /// descending range. Kept for compatibility with legacy asset layouts.
    AttemptUpgrade,
}

/// Static configuration of an [`AssetDatabase`](crate::AssetDatabase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDbConfig {
    /// File name of the database, both as an asset and once installed.
    pub database_name: String,
    /// Target schema version shipped with this build.
    pub version: u32,
    /// Directory holding the installed database file.
    pub storage_dir: PathBuf,
    /// Asset directory holding the database and its upgrade scripts.
    #[serde(default = "default_asset_root")]
    pub asset_root: String,
    /// Installed versions below this are replaced instead of upgraded.
    #[serde(default)]
    pub forced_upgrade_version: u32,
    #[serde(default)]
    pub downgrade_policy: DowngradePolicy,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_statement_terminator")]
    pub statement_terminator: char,
}

impl AssetDbConfig {
    /// Creates a config installing into `<data_dir>/databases`.
    pub fn new(database_name: impl Into<String>, version: u32, data_dir: impl AsRef<Path>) -> Self {
        Self {
            database_name: database_name.into(),
            version,
            storage_dir: data_dir.as_ref().join(STORAGE_SUBDIR),
            asset_root: default_asset_root(),
            forced_upgrade_version: 0,
            downgrade_policy: DowngradePolicy::default(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            statement_terminator: DEFAULT_STATEMENT_TERMINATOR,
        }
    }

    pub fn with_storage_dir(mut self, storage_dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = storage_dir.into();
        self
    }

    pub fn with_asset_root(mut self, asset_root: impl Into<String>) -> Self {
        self.asset_root = asset_root.into();
        self
    }

    pub fn with_forced_upgrade_version(mut self, version: u32) -> Self {
        self.forced_upgrade_version = version;
        self
    }

    pub fn with_downgrade_policy(mut self, policy: DowngradePolicy) -> Self {
        self.downgrade_policy = policy;
        self
    }

    /// Validates naming and version invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_VERSION).contains(&self.version) {
            return Err(ConfigError::InvalidVersion(self.version));
        }

        let name = self.database_name.as_str();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseName);
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidDatabaseName(name.to_string()));
        }

        if self
            .asset_root
            .split(['/', '\\'])
            .any(|segment| segment == "..")
        {
            return Err(ConfigError::InvalidAssetRoot(self.asset_root.clone()));
        }

        if self.statement_terminator.is_whitespace() {
            return Err(ConfigError::InvalidTerminator(self.statement_terminator));
        }
        Ok(())
    }

    /// Path of the installed database file.
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(&self.database_name)
    }

    /// Asset name of the bundled database file.
    pub fn database_asset_name(&self) -> String {
        database_asset_name(&self.asset_root, &self.database_name)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_asset_root() -> String {
    DEFAULT_ASSET_ROOT.to_string()
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_statement_terminator() -> char {
    DEFAULT_STATEMENT_TERMINATOR
}

/// Rejected configuration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidVersion(u32),
    EmptyDatabaseName,
    InvalidDatabaseName(String),
    InvalidAssetRoot(String),
    InvalidTerminator(char),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidVersion(version) => {
                write!(f, "version must be in 1..={MAX_VERSION}, was {version}")
            }
            Self::EmptyDatabaseName => write!(f, "database name cannot be empty"),
            Self::InvalidDatabaseName(name) => {
                write!(f, "database name must be a plain file name, got `{name}`")
            }
            Self::InvalidAssetRoot(root) => {
                write!(f, "asset root must not contain `..` segments, got `{root}`")
            }
            Self::InvalidTerminator(ch) => {
                write!(f, "statement terminator cannot be whitespace, got {ch:?}")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{AssetDbConfig, ConfigError, DowngradePolicy};
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn new_installs_under_databases_subdir() {
        let config = AssetDbConfig::new("app.db", 3, "/data/app");

        assert_eq!(config.storage_dir, Path::new("/data/app/databases"));
        assert_eq!(
            config.database_path(),
            Path::new("/data/app/databases/app.db")
        );
        assert_eq!(config.database_asset_name(), "databases/app.db");
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.downgrade_policy, DowngradePolicy::Reject);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_version() {
        let config = AssetDbConfig::new("app.db", 0, "/data");
        assert_eq!(config.validate(), Err(ConfigError::InvalidVersion(0)));
    }

    #[test]
    fn validate_rejects_version_beyond_marker_range() {
        let config = AssetDbConfig::new("app.db", i32::MAX as u32 + 1, "/data");
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidVersion(i32::MAX as u32 + 1))
        );
        assert!(AssetDbConfig::new("app.db", i32::MAX as u32, "/data")
            .validate()
            .is_ok());
    }

    #[test]
    fn validate_rejects_asset_root_climbing_out_of_store() {
        for root in ["..", "../x", "bundle/../../x", "bundle\\..\\x"] {
            let config = AssetDbConfig::new("app.db", 1, "/data").with_asset_root(root);
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidAssetRoot(root.to_string())),
                "root `{root}` must be rejected"
            );
        }
        let nested = AssetDbConfig::new("app.db", 1, "/data").with_asset_root("bundle/sql");
        assert!(nested.validate().is_ok());
    }

    #[test]
    fn validate_rejects_path_like_names() {
        for name in ["", "  ", "..", "nested/app.db", "nested\\app.db"] {
            let config = AssetDbConfig::new(name, 1, "/data");
            assert!(config.validate().is_err(), "name `{name}` must be rejected");
        }
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: AssetDbConfig = serde_json::from_str(
            r#"{
                "database_name": "app.db",
                "version": 4,
                "storage_dir": "/var/lib/app",
                "downgrade_policy": "attempt_upgrade"
            }"#,
        )
        .unwrap();

        assert_eq!(config.asset_root, "databases");
        assert_eq!(config.forced_upgrade_version, 0);
        assert_eq!(config.statement_terminator, ';');
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.downgrade_policy, DowngradePolicy::AttemptUpgrade);
        assert_eq!(config.database_path(), Path::new("/var/lib/app/app.db"));
    }
}
