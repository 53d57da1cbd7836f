pub mod authz;
pub mod config;
pub mod error;
pub mod geoip;
pub mod updater;
