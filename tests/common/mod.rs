//! Shared fixtures for integration tests
#![allow(dead_code)]

use geogate::error::GeoError;
use geogate::geoip::{CountryDatabase, DatabaseLoader};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::net::IpAddr;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Stand-in dataset: one `ip=CC` pair per line
pub struct TextDatabase(HashMap<IpAddr, String>);

impl CountryDatabase for TextDatabase {
    fn country(&self, ip: IpAddr) -> Result<Option<String>, GeoError> {
        Ok(self.0.get(&ip).cloned())
    }
}

/// Loader for [`TextDatabase`]; any malformed line fails validation
pub struct TextLoader;

impl DatabaseLoader for TextLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn CountryDatabase>, GeoError> {
        let invalid = |reason: String| GeoError::Invalid {
            path: path.to_path_buf(),
            reason,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let mut entries = HashMap::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let (ip, code) = line
                .split_once('=')
                .ok_or_else(|| invalid(format!("bad line {line:?}")))?;
            let ip = ip
                .trim()
                .parse()
                .map_err(|_| invalid(format!("bad ip {ip:?}")))?;
            entries.insert(ip, code.trim().to_string());
        }
        Ok(Box::new(TextDatabase(entries)))
    }
}

/// Build an in-memory zip archive
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
