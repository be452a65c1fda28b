//! Upgrade script descriptors and the backward greedy path resolver.

use std::fmt::{Display, Formatter};

/// One bundled upgrade script moving the schema from `from` to `to`.
///
/// Ordering is by `(from, to)`, which is the execution order of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UpgradeScript {
    pub from: u32,
    pub to: u32,
}

impl UpgradeScript {
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }
}

impl Display for UpgradeScript {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Ordered list of scripts to run, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradePlan {
    scripts: Vec<UpgradeScript>,
}

impl UpgradePlan {
    fn from_discovered(mut scripts: Vec<UpgradeScript>) -> Self {
        scripts.sort();
        Self { scripts }
    }

    pub fn scripts(&self) -> &[UpgradeScript] {
        &self.scripts
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Returns true when the scripts chain without gaps from `from` to `to`.
    pub fn spans(&self, from: u32, to: u32) -> bool {
        let (Some(first), Some(last)) = (self.scripts.first(), self.scripts.last()) else {
            return false;
        };
        first.from == from
            && last.to == to
            && self
                .scripts
                .windows(2)
                .all(|pair| pair[0].to == pair[1].from)
    }
}

impl<'a> IntoIterator for &'a UpgradePlan {
    type Item = &'a UpgradeScript;
    type IntoIter = std::slice::Iter<'a, UpgradeScript>;

    fn into_iter(self) -> Self::IntoIter {
        self.scripts.iter()
    }
}

/// Runs the backward greedy walk and returns every script it accepted.
///
/// The walk starts at window `[new_version - 1, new_version]`. An accepted
/// window `(start, end)` moves to `(start - 1, start)`; a rejected one keeps
/// `end` and widens to `(start - 1, end)`, so the widest single jump ending
/// at the current bound always wins. The walk stops once the next lower
/// bound would fall below `base_version`.
///
/// The result is sorted but not checked for coverage; see
/// [`resolve_upgrade_plan`] for the checked form.
pub fn discover_upgrade_scripts(
    base_version: u32,
    new_version: u32,
    mut probe: impl FnMut(UpgradeScript) -> bool,
) -> UpgradePlan {
    let mut accepted = Vec::new();
    let Some(mut start) = new_version.checked_sub(1) else {
        return UpgradePlan::default();
    };
    let mut end = new_version;

    loop {
        let candidate = UpgradeScript::new(start, end);
        if probe(candidate) {
            accepted.push(candidate);
            end = start;
        }
        match start.checked_sub(1) {
            Some(next) if next >= base_version => start = next,
            _ => break,
        }
    }

    UpgradePlan::from_discovered(accepted)
}

/// Resolves the scripts needed to move a database from `base_version` to
/// `new_version`.
///
/// `probe` reports whether a script is shipped. Returns an empty plan when
/// the accepted scripts do not chain all the way down to `base_version`.
pub fn resolve_upgrade_plan(
    base_version: u32,
    new_version: u32,
    probe: impl FnMut(UpgradeScript) -> bool,
) -> UpgradePlan {
    let plan = discover_upgrade_scripts(base_version, new_version, probe);
    if plan.spans(base_version, new_version) {
        plan
    } else {
        UpgradePlan::default()
    }
}
