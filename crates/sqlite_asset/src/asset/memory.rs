//! In-memory resource store, typically fed by `include_bytes!`.

use super::{AssetError, AssetResult, ResourceStore};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct MemoryResourceStore {
    assets: BTreeMap<String, Vec<u8>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryResourceStore::insert`].
    pub fn with_asset(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Registers or replaces one asset.
    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.assets.insert(name.into(), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl ResourceStore for MemoryResourceStore {
    fn fetch(&self, name: &str) -> AssetResult<Vec<u8>> {
        self.assets
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::Missing {
                name: name.to_string(),
            })
    }

    fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    fn list(&self) -> AssetResult<Vec<String>> {
        Ok(self.assets.keys().cloned().collect())
    }
}
