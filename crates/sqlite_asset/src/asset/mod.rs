//! Bundled asset access for packaged database files and upgrade scripts.
//!
//! # Responsibility
//! - Resolve logical asset names (`databases/app.db`) to raw bytes.
//! - Materialize a bundled database into the storage directory, unwrapping
//!   `.zip` and `.gz` variants transparently.
//!
//! # Invariants
//! - Materialization probes the raw name first, then `<name>.zip`, then
//!   `<name>.gz`.
//! - Bytes are staged in a sibling file and renamed into place, so a failed
//!   copy never leaves a truncated database at the destination.

mod archive;
mod directory;
mod memory;

use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub use directory::DirectoryResourceStore;
pub use memory::MemoryResourceStore;

pub type AssetResult<T> = Result<T, AssetError>;

/// Failure while reading or materializing a bundled asset.
#[derive(Debug)]
pub enum AssetError {
    /// No raw, `.zip` or `.gz` variant exists for the asset.
    Missing { name: String },
    /// The asset exists but could not be read.
    Read { name: String, source: io::Error },
    /// A compressed variant was found but could not be unpacked.
    InvalidArchive { name: String, reason: String },
    /// The destination directory or file could not be created or written.
    Unwritable { path: PathBuf, source: io::Error },
    /// The name would resolve outside the store (a `..` segment).
    InvalidName { name: String },
}

impl Display for AssetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { name } => write!(
                f,
                "missing asset `{name}` (or `{name}.zip`, `{name}.gz` archive)"
            ),
            Self::Read { name, source } => write!(f, "failed to read asset `{name}`: {source}"),
            Self::InvalidArchive { name, reason } => {
                write!(f, "invalid archive `{name}`: {reason}")
            }
            Self::Unwritable { path, source } => {
                write!(f, "unable to write `{}`: {source}", path.display())
            }
            Self::InvalidName { name } => {
                write!(f, "asset name `{name}` escapes the asset root")
            }
        }
    }
}

impl Error for AssetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Unwritable { source, .. } => Some(source),
            Self::Missing { .. } | Self::InvalidArchive { .. } | Self::InvalidName { .. } => None,
        }
    }
}

/// Encoding under which an asset was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetEncoding {
    Raw,
    Zip,
    Gzip,
}

impl AssetEncoding {
    const PROBE_ORDER: [AssetEncoding; 3] = [Self::Raw, Self::Zip, Self::Gzip];

    fn suffix(self) -> &'static str {
        match self {
            Self::Raw => "",
            Self::Zip => ".zip",
            Self::Gzip => ".gz",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Zip => "zip",
            Self::Gzip => "gzip",
        }
    }
}

/// Read-only source of bundled assets.
///
/// Only `fetch` is required. `materialize` has a default implementation
/// built on top of it that handles the compressed variants.
pub trait ResourceStore: Send + Sync {
    /// Returns the bytes of `name`, or `AssetError::Missing` when absent.
    fn fetch(&self, name: &str) -> AssetResult<Vec<u8>>;

    /// Cheap existence probe for `name`.
    fn contains(&self, name: &str) -> bool {
        self.fetch(name).is_ok()
    }

    /// Lists every asset name known to the store.
    ///
    /// Used for diagnostics only; stores that cannot enumerate return an
    /// empty list.
    fn list(&self) -> AssetResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Copies `name` to `dest_dir/dest_file`, decompressing if needed.
    ///
    /// Returns the path of the written file.
    fn materialize(&self, name: &str, dest_dir: &Path, dest_file: &str) -> AssetResult<PathBuf> {
        materialize_from(self, name, dest_dir, dest_file)
    }
}

/// Fetches the first available encoding of `name`.
pub fn fetch_any_encoding<S: ResourceStore + ?Sized>(
    store: &S,
    name: &str,
) -> AssetResult<(AssetEncoding, Vec<u8>)> {
    for encoding in AssetEncoding::PROBE_ORDER {
        let candidate = format!("{name}{}", encoding.suffix());
        match store.fetch(&candidate) {
            Ok(bytes) => return Ok((encoding, bytes)),
            Err(AssetError::Missing { .. }) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(AssetError::Missing {
        name: name.to_string(),
    })
}

/// Materialization pipeline shared by every store implementation.
///
/// # Side effects
/// - Creates `dest_dir` when missing and replaces `dest_dir/dest_file`.
/// - Emits `asset_materialize` logging events with duration and status.
pub fn materialize_from<S: ResourceStore + ?Sized>(
    store: &S,
    name: &str,
    dest_dir: &Path,
    dest_file: &str,
) -> AssetResult<PathBuf> {
    let started_at = Instant::now();
    info!("event=asset_materialize module=asset status=start asset={name}");

    let result = fetch_any_encoding(store, name).and_then(|(encoding, bytes)| {
        let payload = match encoding {
            AssetEncoding::Raw => bytes,
            AssetEncoding::Zip => archive::extract_first_zip_entry(&format!("{name}.zip"), &bytes)?,
            AssetEncoding::Gzip => archive::gunzip(&format!("{name}.gz"), &bytes)?,
        };
        let dest = write_staged(dest_dir, dest_file, &payload)?;
        Ok((encoding, payload.len(), dest))
    });

    match result {
        Ok((encoding, size, dest)) => {
            info!(
                "event=asset_materialize module=asset status=ok asset={name} encoding={} bytes={size} dest={} duration_ms={}",
                encoding.as_str(),
                dest.display(),
                started_at.elapsed().as_millis()
            );
            Ok(dest)
        }
        Err(err) => {
            error!(
                "event=asset_materialize module=asset status=error asset={name} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn write_staged(dest_dir: &Path, dest_file: &str, payload: &[u8]) -> AssetResult<PathBuf> {
    fs::create_dir_all(dest_dir).map_err(|source| AssetError::Unwritable {
        path: dest_dir.to_path_buf(),
        source,
    })?;

    let dest = dest_dir.join(dest_file);
    let staging = dest_dir.join(format!("{dest_file}.partial"));
    fs::write(&staging, payload).map_err(|source| AssetError::Unwritable {
        path: staging.clone(),
        source,
    })?;

    if let Err(source) = fs::rename(&staging, &dest) {
        let _ = fs::remove_file(&staging);
        return Err(AssetError::Unwritable { path: dest, source });
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::{fetch_any_encoding, AssetEncoding, AssetError, MemoryResourceStore, ResourceStore};

    #[test]
    fn fetch_any_encoding_prefers_raw_over_archives() {
        let store = MemoryResourceStore::new()
            .with_asset("databases/app.db", b"raw".to_vec())
            .with_asset("databases/app.db.gz", b"gz".to_vec());

        let (encoding, bytes) = fetch_any_encoding(&store, "databases/app.db").unwrap();
        assert_eq!(encoding, AssetEncoding::Raw);
        assert_eq!(bytes, b"raw");
    }

    #[test]
    fn fetch_any_encoding_reports_logical_name_when_all_variants_missing() {
        let store = MemoryResourceStore::new();
        let err = fetch_any_encoding(&store, "databases/app.db").unwrap_err();
        match err {
            AssetError::Missing { name } => assert_eq!(name, "databases/app.db"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn materialize_writes_raw_asset_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryResourceStore::new().with_asset("databases/app.db", b"payload".to_vec());

        let dest = store
            .materialize("databases/app.db", &dir.path().join("nested"), "app.db")
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert!(!dir.path().join("nested").join("app.db.partial").exists());
    }

    #[test]
    fn materialize_into_file_path_reports_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = MemoryResourceStore::new().with_asset("databases/app.db", b"payload".to_vec());

        let err = store
            .materialize("databases/app.db", &blocker, "app.db")
            .unwrap_err();
        assert!(matches!(err, AssetError::Unwritable { .. }));
    }
}
