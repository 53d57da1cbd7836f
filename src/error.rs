use std::path::PathBuf;
use thiserror::Error;

/// Failures opening or querying a geolocation dataset
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("failed to open dataset at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: maxminddb::MaxMindDbError,
    },
    #[error("dataset lookup failed: {0}")]
    Lookup(#[from] maxminddb::MaxMindDbError),
    #[error("invalid dataset at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Failures inside a single refresh cycle. None of these are fatal; the
/// active dataset stays in place and the next tick tries again.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("request to dataset provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("dataset provider answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("download of {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to read dataset archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("no .mmdb entry found in dataset archive")]
    MissingEntry,
    #[error(transparent)]
    Swap(#[from] SwapError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Outcome of a failed swap
#[derive(Debug, Error)]
pub enum SwapError {
    /// The staged file could not be opened; the previous dataset is still active.
    #[error("staged dataset rejected: {0}")]
    Invalid(#[source] GeoError),
    /// The new dataset is active in memory but could not be renamed into place.
    /// Memory and disk disagree until the next successful swap or restart.
    #[error("new dataset is active but could not be moved to {path}: {source}")]
    NotPersisted {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
