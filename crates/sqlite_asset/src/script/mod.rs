//! SQL script handling for upgrade assets.
//!
//! # Responsibility
//! - Split a script blob into individually executable statements.
//!
//! # Invariants
//! - Terminators inside quoted text or comments never end a statement.
//! - Segments without executable text are dropped, never executed.

mod split;

pub use split::split_sql_script;

/// Statement terminator used by upgrade scripts unless configured otherwise.
pub const DEFAULT_STATEMENT_TERMINATOR: char = ';';
