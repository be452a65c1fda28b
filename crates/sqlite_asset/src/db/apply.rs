//! Transactional application of a resolved upgrade plan.
//!
//! # Invariants
//! - Every executed statement and the version stamp share one transaction.
//! - A script that cannot be fetched or decoded is skipped with a warning;
//!   a statement that fails aborts and rolls back the whole plan.

use super::version::write_schema_version;
use super::{DbError, DbResult};
use crate::script::split_sql_script;
use crate::upgrade::{UpgradeCatalog, UpgradePlan};
use log::{error, info, warn};
use rusqlite::Connection;
use std::time::Instant;

/// Counters describing one applied plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub scripts_applied: usize,
    /// Scripts skipped because they could not be loaded.
    pub scripts_skipped: usize,
    pub statements_executed: usize,
}

/// Runs every script of `plan` and stamps `target_version`, all-or-nothing.
///
/// # Side effects
/// - Emits `upgrade_apply` and per-script `upgrade_script` logging events.
///
/// # Errors
/// - `DbError::ScriptFailed` when a statement fails; nothing is committed.
/// - `DbError::Sqlite` when the transaction cannot begin, stamp or commit.
pub fn apply_upgrade_plan(
    conn: &mut Connection,
    plan: &UpgradePlan,
    target_version: u32,
    catalog: &UpgradeCatalog<'_>,
    terminator: char,
) -> DbResult<ApplyReport> {
    let started_at = Instant::now();
    info!(
        "event=upgrade_apply module=db status=start scripts={} target_version={target_version}",
        plan.len()
    );

    let mut report = ApplyReport::default();
    let tx = conn.transaction()?;

    for &script in plan {
        let name = catalog.asset_name(script);
        let sql = match catalog.load(script) {
            Ok(sql) => sql,
            Err(err) => {
                warn!("event=upgrade_script module=db status=skipped script={name} error={err}");
                report.scripts_skipped += 1;
                continue;
            }
        };

        info!("event=upgrade_script module=db status=start script={name}");
        for (index, statement) in split_sql_script(&sql, terminator).iter().enumerate() {
            if let Err(source) = tx.execute_batch(statement) {
                error!(
                    "event=upgrade_script module=db status=error script={name} statement={} duration_ms={} error={source}",
                    index + 1,
                    started_at.elapsed().as_millis()
                );
                return Err(DbError::ScriptFailed {
                    script: name,
                    statement: index + 1,
                    source,
                });
            }
            report.statements_executed += 1;
        }
        report.scripts_applied += 1;
    }

    write_schema_version(&tx, target_version)?;
    tx.commit()?;

    info!(
        "event=upgrade_apply module=db status=ok target_version={target_version} applied={} skipped={} statements={} duration_ms={}",
        report.scripts_applied,
        report.scripts_skipped,
        report.statements_executed,
        started_at.elapsed().as_millis()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{apply_upgrade_plan, ApplyReport};
    use crate::asset::MemoryResourceStore;
    use crate::db::{read_schema_version, write_schema_version, DbError};
    use crate::upgrade::UpgradeCatalog;
    use rusqlite::Connection;

    fn base_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE items (name TEXT NOT NULL);")
            .unwrap();
        write_schema_version(&conn, 1).unwrap();
        conn
    }

    fn item_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn applies_scripts_in_order_and_stamps_version() {
        let store = MemoryResourceStore::new()
            .with_asset(
                "databases/app.db_upgrade_1-2.sql",
                "ALTER TABLE items ADD COLUMN qty INTEGER;".as_bytes(),
            )
            .with_asset(
                "databases/app.db_upgrade_2-3.sql",
                "INSERT INTO items (name, qty) VALUES ('a;b', 1);\n   \n;INSERT INTO items VALUES ('c', 2);"
                    .as_bytes(),
            );
        let catalog = UpgradeCatalog::new(&store, "databases", "app.db");
        let mut conn = base_connection();
        let plan = catalog.resolve(1, 3);

        let report = apply_upgrade_plan(&mut conn, &plan, 3, &catalog, ';').unwrap();

        assert_eq!(
            report,
            ApplyReport {
                scripts_applied: 2,
                scripts_skipped: 0,
                statements_executed: 3,
            }
        );
        assert_eq!(item_count(&conn), 2);
        assert_eq!(read_schema_version(&conn).unwrap(), 3);
    }

    #[test]
    fn failing_statement_rolls_back_scripts_and_marker() {
        let store = MemoryResourceStore::new()
            .with_asset(
                "databases/app.db_upgrade_1-2.sql",
                "INSERT INTO items VALUES ('kept?');".as_bytes(),
            )
            .with_asset(
                "databases/app.db_upgrade_2-3.sql",
                "INSERT INTO missing_table VALUES (1);".as_bytes(),
            );
        let catalog = UpgradeCatalog::new(&store, "databases", "app.db");
        let mut conn = base_connection();
        let plan = catalog.resolve(1, 3);

        let err = apply_upgrade_plan(&mut conn, &plan, 3, &catalog, ';').unwrap_err();

        match err {
            DbError::ScriptFailed {
                script, statement, ..
            } => {
                assert_eq!(script, "databases/app.db_upgrade_2-3.sql");
                assert_eq!(statement, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(item_count(&conn), 0);
        assert_eq!(read_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn undecodable_script_is_skipped_and_upgrade_still_commits() {
        let store = MemoryResourceStore::new()
            .with_asset("databases/app.db_upgrade_1-2.sql", vec![0xc3_u8, 0x28])
            .with_asset(
                "databases/app.db_upgrade_2-3.sql",
                "INSERT INTO items VALUES ('x');".as_bytes(),
            );
        let catalog = UpgradeCatalog::new(&store, "databases", "app.db");
        let mut conn = base_connection();
        let plan = catalog.resolve(1, 3);

        let report = apply_upgrade_plan(&mut conn, &plan, 3, &catalog, ';').unwrap();

        assert_eq!(report.scripts_skipped, 1);
        assert_eq!(report.scripts_applied, 1);
        assert_eq!(item_count(&conn), 1);
        assert_eq!(read_schema_version(&conn).unwrap(), 3);
    }
}
