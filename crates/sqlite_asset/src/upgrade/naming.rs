//! Asset naming template for bundled databases and upgrade scripts.

use super::plan::UpgradeScript;
use once_cell::sync::Lazy;
use regex::Regex;

/// Asset directory holding bundled databases unless configured otherwise.
pub const DEFAULT_ASSET_ROOT: &str = "databases";

static UPGRADE_SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.+)_upgrade_(?P<from>[0-9]+)-(?P<to>[0-9]+)\.sql$")
        .expect("valid upgrade script regex")
});

impl UpgradeScript {
    /// Renders `<asset_root>/<database_name>_upgrade_<from>-<to>.sql`.
    pub fn asset_name(&self, asset_root: &str, database_name: &str) -> String {
        join_asset_path(
            asset_root,
            &format!("{database_name}_upgrade_{}-{}.sql", self.from, self.to),
        )
    }
}

/// Asset name of the bundled database file itself.
pub fn database_asset_name(asset_root: &str, database_name: &str) -> String {
    join_asset_path(asset_root, database_name)
}

/// Recognizes an upgrade script asset belonging to `database_name`.
///
/// Any directory prefix in `asset_name` is ignored.
pub fn parse_upgrade_script_name(database_name: &str, asset_name: &str) -> Option<UpgradeScript> {
    let file_name = asset_name.rsplit('/').next()?;
    let captures = UPGRADE_SCRIPT_RE.captures(file_name)?;
    if &captures["name"] != database_name {
        return None;
    }
    let from = captures["from"].parse().ok()?;
    let to = captures["to"].parse().ok()?;
    Some(UpgradeScript::new(from, to))
}

fn join_asset_path(asset_root: &str, file_name: &str) -> String {
    let root = asset_root.trim_end_matches('/');
    if root.is_empty() {
        file_name.to_string()
    } else {
        format!("{root}/{file_name}")
    }
}
