use std::fs::File;
use std::io;
use std::path::Path;
use tempfile::TempPath;
use zip::ZipArchive;

use crate::error::UpdateError;

/// Extension identifying the dataset inside a provider archive
pub const DATASET_EXTENSION: &str = ".mmdb";

/// Copy the dataset out of a downloaded zip archive into a fresh temp file in
/// `staging_dir`.
///
/// Staging next to the canonical path keeps the later promotion a same-filesystem
/// rename. The temp file is deleted if the returned path is dropped unpersisted.
pub fn extract_dataset(archive: &Path, staging_dir: &Path) -> Result<TempPath, UpdateError> {
    let mut archive = ZipArchive::new(File::open(archive)?)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || !entry.name().ends_with(DATASET_EXTENSION) {
            continue;
        }

        let mut staged = tempfile::Builder::new()
            .prefix(".geogate-")
            .suffix(".mmdb.tmp")
            .tempfile_in(staging_dir)?;
        let bytes = io::copy(&mut entry, staged.as_file_mut())?;
        staged.as_file().sync_all()?;

        tracing::debug!(
            entry = entry.name(),
            bytes,
            staged = %staged.path().display(),
            "Extracted GeoIP database from archive"
        );
        return Ok(staged.into_temp_path());
    }

    Err(UpdateError::MissingEntry)
}
