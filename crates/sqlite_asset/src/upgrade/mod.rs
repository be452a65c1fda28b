//! Upgrade path resolution over bundled upgrade scripts.
//!
//! # Responsibility
//! - Name upgrade script assets deterministically from `(from, to)` pairs.
//! - Resolve the ordered script sequence moving a database between versions.
//!
//! # Invariants
//! - Resolution walks backward from the target and prefers the widest jump.
//! - Resolved plans run oldest first and chain without gaps, or are empty.

mod catalog;
mod naming;
mod plan;

pub use catalog::UpgradeCatalog;
pub use naming::{database_asset_name, parse_upgrade_script_name, DEFAULT_ASSET_ROOT};
pub use plan::{discover_upgrade_scripts, resolve_upgrade_plan, UpgradePlan, UpgradeScript};
