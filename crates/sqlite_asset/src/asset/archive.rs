//! Decoders for compressed asset variants.

use super::{AssetError, AssetResult};
use flate2::read::GzDecoder;
use std::fmt::Display;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Returns the contents of the first regular file stored in a zip archive.
pub(super) fn extract_first_zip_entry(name: &str, bytes: &[u8]) -> AssetResult<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|err| invalid(name, err))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|err| invalid(name, err))?;
        if !entry.is_file() {
            continue;
        }
        let mut payload = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut payload)
            .map_err(|err| invalid(name, err))?;
        return Ok(payload);
    }

    Err(AssetError::InvalidArchive {
        name: name.to_string(),
        reason: "archive is missing a database file entry".to_string(),
    })
}

pub(super) fn gunzip(name: &str, bytes: &[u8]) -> AssetResult<Vec<u8>> {
    let mut payload = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut payload)
        .map_err(|err| invalid(name, err))?;
    Ok(payload)
}

fn invalid(name: &str, reason: impl Display) -> AssetError {
    AssetError::InvalidArchive {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
