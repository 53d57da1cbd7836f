//! Shared, hot-swappable geolocation dataset
//!
//! Request handlers take the read lock for the duration of one lookup. The
//! updater takes the write lock only to open a staged file and exchange it
//! with the active dataset, never across network I/O.

use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tempfile::TempPath;
use tracing::{debug, error, info, warn};

use super::database::{CountryDatabase, DatabaseLoader};
use crate::error::{GeoError, SwapError};

/// Result of classifying an address against the active dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Country {
    Known(String),
    Unknown,
}

impl Country {
    pub fn code(&self) -> &str {
        match self {
            Country::Known(code) => code,
            Country::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Address-to-country classification consumed by the decision engine
pub trait CountryLookup: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Country;
}

/// The active dataset plus the lock guarding its replacement
pub struct GeoDatabase {
    path: PathBuf,
    loader: Arc<dyn DatabaseLoader>,
    active: RwLock<Option<Box<dyn CountryDatabase>>>,
}

impl GeoDatabase {
    /// Open the dataset at `path`. Used at startup, where failure is fatal.
    pub fn open(path: impl Into<PathBuf>, loader: Arc<dyn DatabaseLoader>) -> Result<Self, GeoError> {
        let path = path.into();
        let database = loader.open(&path)?;
        info!(path = %path.display(), "Loaded GeoIP database");
        Ok(Self {
            path,
            loader,
            active: RwLock::new(Some(database)),
        })
    }

    /// A handle with no dataset yet; every lookup resolves to `Unknown` until
    /// the first successful swap.
    pub fn unloaded(path: impl Into<PathBuf>, loader: Arc<dyn DatabaseLoader>) -> Self {
        Self {
            path: path.into(),
            loader,
            active: RwLock::new(None),
        }
    }

    /// Canonical on-disk location of the dataset
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Modification time of the canonical dataset file, `None` if it does not exist
    pub fn freshness_marker(&self) -> Option<DateTime<Utc>> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    /// Resolve `ip` against the active dataset. Lookup errors and a missing
    /// dataset both map to `Country::Unknown`.
    pub fn lookup(&self, ip: IpAddr) -> Country {
        let guard = self.active.read().unwrap_or_else(PoisonError::into_inner);
        let Some(database) = guard.as_ref() else {
            return Country::Unknown;
        };

        match database.country(ip) {
            Ok(Some(code)) => Country::Known(code),
            Ok(None) => Country::Unknown,
            Err(err) => {
                debug!(%ip, error = %err, "GeoIP lookup failed");
                Country::Unknown
            }
        }
    }

    /// Install a staged dataset.
    ///
    /// The staged file is opened under the write lock; if that fails the
    /// previous dataset stays active and the staged file is removed. On
    /// success the new dataset replaces the old one in memory, the staged file
    /// is renamed over the canonical path, and the old dataset is dropped.
    ///
    /// A failed rename leaves the new dataset active while the old file stays
    /// on disk, so a restart would load the older data again. That case is
    /// reported as [`SwapError::NotPersisted`].
    pub fn swap(&self, staged: TempPath) -> Result<(), SwapError> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);

        let database = match self.loader.open(&staged) {
            Ok(database) => database,
            Err(err) => {
                warn!(
                    staged = %staged.display(),
                    error = %err,
                    "Staged GeoIP database failed validation, keeping current database"
                );
                return Err(SwapError::Invalid(err));
            }
        };

        let previous = active.replace(database);
        let persisted = staged.persist(&self.path);
        drop(active);
        drop(previous);

        match persisted {
            Ok(()) => {
                info!(path = %self.path.display(), "GeoIP database swapped");
                Ok(())
            }
            Err(err) => {
                error!(
                    path = %self.path.display(),
                    error = %err.error,
                    "New GeoIP database is active but could not be moved into place; disk copy is stale"
                );
                Err(SwapError::NotPersisted {
                    path: self.path.clone(),
                    source: err.error,
                })
            }
        }
    }
}

impl CountryLookup for GeoDatabase {
    fn lookup(&self, ip: IpAddr) -> Country {
        GeoDatabase::lookup(self, ip)
    }
}

impl fmt::Debug for GeoDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoDatabase")
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
