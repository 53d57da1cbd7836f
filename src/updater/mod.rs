//! Background refresh of the GeoIP database
//!
//! A refresh cycle probes the provider for a newer dataset, downloads the zip
//! archive, extracts the `.mmdb` entry next to the canonical path and swaps it
//! into the shared [`GeoDatabase`]. Any failure leaves the current dataset in
//! place; the scheduler simply tries again on the next tick.

mod extract;
pub mod freshness;
mod scheduler;
mod source;

pub use extract::{extract_dataset, DATASET_EXTENSION};
pub use scheduler::{Scheduler, TickSource};
pub use source::{DatasetSource, MaxMindSource};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::UpdateError;
use crate::geoip::GeoDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The remote dataset is not newer; nothing was transferred
    UpToDate,
    /// A new dataset was downloaded and is now active
    Updated,
}

/// Runs refresh cycles against one dataset source and one database handle
pub struct Updater {
    source: Arc<dyn DatasetSource>,
    database: Arc<GeoDatabase>,
}

impl Updater {
    pub fn new(source: Arc<dyn DatasetSource>, database: Arc<GeoDatabase>) -> Self {
        Self { source, database }
    }

    /// Run one full refresh cycle: freshness probe, download, extract, swap
    pub async fn run_cycle(&self) -> Result<CycleOutcome, UpdateError> {
        let local = self.database.freshness_marker();
        if !self.source.needs_refresh(local).await {
            return Ok(CycleOutcome::UpToDate);
        }

        let staging_dir = staging_dir(self.database.path());
        tokio::fs::create_dir_all(&staging_dir).await?;

        // Removed on drop, whatever the outcome
        let archive = tempfile::Builder::new()
            .prefix(".geogate-")
            .suffix(".zip")
            .tempfile_in(&staging_dir)?;
        let mut out = tokio::fs::File::from_std(archive.as_file().try_clone()?);
        let bytes = self.source.download(&mut out).await?;
        drop(out);
        info!(bytes, "Downloaded new GeoIP database archive");

        let archive_path = archive.path().to_path_buf();
        let staged =
            tokio::task::spawn_blocking(move || extract_dataset(&archive_path, &staging_dir))
                .await??;
        drop(archive);

        let database = Arc::clone(&self.database);
        tokio::task::spawn_blocking(move || database.swap(staged)).await??;

        debug!(path = %self.database.path().display(), "Refresh cycle complete");
        Ok(CycleOutcome::Updated)
    }
}

fn staging_dir(db_path: &Path) -> PathBuf {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
