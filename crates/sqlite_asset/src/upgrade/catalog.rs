//! Upgrade scripts shipped for one database inside a resource store.

use super::naming::parse_upgrade_script_name;
use super::plan::{discover_upgrade_scripts, resolve_upgrade_plan, UpgradePlan, UpgradeScript};
use crate::asset::{AssetError, AssetResult, ResourceStore};
use log::{debug, info, warn};
use std::io;

/// View over the upgrade scripts of one bundled database.
#[derive(Clone, Copy)]
pub struct UpgradeCatalog<'a> {
    store: &'a dyn ResourceStore,
    asset_root: &'a str,
    database_name: &'a str,
}

impl<'a> UpgradeCatalog<'a> {
    pub fn new(store: &'a dyn ResourceStore, asset_root: &'a str, database_name: &'a str) -> Self {
        Self {
            store,
            asset_root,
            database_name,
        }
    }

    pub fn asset_name(&self, script: UpgradeScript) -> String {
        script.asset_name(self.asset_root, self.database_name)
    }

    pub fn contains(&self, script: UpgradeScript) -> bool {
        let name = self.asset_name(script);
        let found = self.store.contains(&name);
        if !found {
            debug!("event=upgrade_resolve module=upgrade status=probe_miss script={name}");
        }
        found
    }

    /// Loads one script as UTF-8 text.
    pub fn load(&self, script: UpgradeScript) -> AssetResult<String> {
        let name = self.asset_name(script);
        let bytes = self.store.fetch(&name)?;
        String::from_utf8(bytes).map_err(|err| AssetError::Read {
            name,
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        })
    }

    /// Scripts the store reports for this database, sorted by `(from, to)`.
    ///
    /// Listing failures are logged and reported as an empty list.
    pub fn available(&self) -> Vec<UpgradeScript> {
        let names = match self.store.list() {
            Ok(names) => names,
            Err(err) => {
                warn!("event=upgrade_catalog module=upgrade status=error error={err}");
                return Vec::new();
            }
        };
        let mut scripts = names
            .iter()
            .filter_map(|name| parse_upgrade_script_name(self.database_name, name))
            .collect::<Vec<_>>();
        scripts.sort();
        scripts
    }

    /// Resolves a covering plan from `installed` to `target`.
    pub fn resolve(&self, installed: u32, target: u32) -> UpgradePlan {
        let plan = resolve_upgrade_plan(installed, target, |script| self.contains(script));
        info!(
            "event=upgrade_resolve module=upgrade status={} database={} from={installed} to={target} scripts={}",
            if plan.is_empty() { "empty" } else { "ok" },
            self.database_name,
            plan.len()
        );
        plan
    }

    /// Runs the raw greedy walk without the coverage check.
    pub fn discover(&self, installed: u32, target: u32) -> UpgradePlan {
        discover_upgrade_scripts(installed, target, |script| self.contains(script))
    }
}
