//! IP geolocation for access decisions
//!
//! This module owns the live geolocation dataset: the MaxMind reader behind a
//! reader/writer lock, the private-range classifier, and the swap that
//! installs a freshly downloaded dataset.

mod database;
mod handle;
mod private;

pub use database::{CountryDatabase, DatabaseLoader, MaxMindDatabase, MaxMindLoader};
pub use handle::{Country, CountryLookup, GeoDatabase};
pub use private::is_private_ip;
