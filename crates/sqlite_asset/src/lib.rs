//! Ships a pre-populated SQLite database inside application assets and keeps
//! the installed copy current across releases.
//!
//! The entry point is [`AssetDatabase`]: it installs the bundled database on
//! first use, replaces or upgrades stale installs with bundled upgrade
//! scripts, and caches one live connection.

pub mod asset;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod logging;
pub mod script;
pub mod upgrade;

pub use asset::{AssetError, DirectoryResourceStore, MemoryResourceStore, ResourceStore};
pub use config::{AssetDbConfig, ConfigError, DowngradePolicy};
pub use db::{DbError, DbResult, OpenMode};
pub use lifecycle::{AssetDatabase, DatabaseHandle, DatabaseHooks};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use script::split_sql_script;
pub use upgrade::{resolve_upgrade_plan, UpgradePlan, UpgradeScript};

/// Returns the crate version.
pub fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
