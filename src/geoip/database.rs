//! Dataset abstractions and the MaxMind MMDB implementation

use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;

use crate::error::GeoError;

/// A loaded, immutable IP-to-country dataset
pub trait CountryDatabase: Send + Sync {
    /// ISO country code for `ip`, or `None` when the dataset has no entry
    fn country(&self, ip: IpAddr) -> Result<Option<String>, GeoError>;
}

/// Opens a dataset file. Opening doubles as validation of a staged download.
pub trait DatabaseLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn CountryDatabase>, GeoError>;
}

/// GeoLite2/GeoIP2 Country (or City) database held in memory
pub struct MaxMindDatabase {
    reader: Reader<Vec<u8>>,
}

impl MaxMindDatabase {
    /// Read the whole file into memory so the on-disk copy can be replaced freely
    pub fn open(path: &Path) -> Result<Self, GeoError> {
        let reader = Reader::open_readfile(path).map_err(|source| GeoError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { reader })
    }

    pub fn database_type(&self) -> &str {
        &self.reader.metadata.database_type
    }

    pub fn build_epoch(&self) -> u64 {
        self.reader.metadata.build_epoch
    }
}

impl CountryDatabase for MaxMindDatabase {
    fn country(&self, ip: IpAddr) -> Result<Option<String>, GeoError> {
        let result = self.reader.lookup(ip)?;
        // City databases are a superset of Country, so this decode works for both
        let country = result.decode::<geoip2::Country>()?;
        Ok(country
            .and_then(|record| record.country.iso_code)
            .filter(|code| !code.is_empty())
            .map(|code| code.to_string()))
    }
}

/// Production loader for `.mmdb` files
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxMindLoader;

impl DatabaseLoader for MaxMindLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn CountryDatabase>, GeoError> {
        let database = MaxMindDatabase::open(path)?;
        tracing::debug!(
            path = %path.display(),
            database_type = database.database_type(),
            build_epoch = database.build_epoch(),
            "Opened MaxMind database"
        );
        Ok(Box::new(database))
    }
}
