//! Filesystem-backed resource store.

use super::{AssetError, AssetResult, ResourceStore};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Serves assets from files below a root directory.
///
/// Asset names always use `/` separators regardless of platform. Names with
/// `..` segments are refused so lookups stay below the root.
#[derive(Debug, Clone)]
pub struct DirectoryResourceStore {
    root: PathBuf,
}

impl DirectoryResourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> AssetResult<PathBuf> {
        let mut path = self.root.clone();
        for segment in name.split('/').filter(|segment| !segment.is_empty()) {
            if segment == ".." || segment.contains('\\') {
                return Err(AssetError::InvalidName {
                    name: name.to_string(),
                });
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl ResourceStore for DirectoryResourceStore {
    fn fetch(&self, name: &str) -> AssetResult<Vec<u8>> {
        match fs::read(self.resolve(name)?) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(AssetError::Missing {
                name: name.to_string(),
            }),
            Err(source) => Err(AssetError::Read {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok_and(|path| path.is_file())
    }

    fn list(&self) -> AssetResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|err| AssetError::Read {
                name: self.root.display().to_string(),
                source: io::Error::from(err),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}
