//! Database lifecycle management for bundled asset databases.
//!
//! # Responsibility
//! - Decide between fresh install, forced replacement, incremental upgrade
//!   and plain open.
//! - Own the single cached connection and serialize initialization.
//!
//! # See also
//! - `upgrade` for path resolution, `db` for transactional application.

mod handle;
mod hooks;
mod manager;

pub use handle::DatabaseHandle;
pub use hooks::{DatabaseHooks, NoopHooks};
pub use manager::AssetDatabase;
