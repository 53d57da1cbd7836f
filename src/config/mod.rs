use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted refresh interval (one year)
pub const MAX_UPDATE_INTERVAL_HOURS: u64 = 366 * 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub policy: PolicyConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Allowlist,
    Blocklist,
}

/// What to do with a request matching a special case (private or unresolved address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    #[default]
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub mode: PolicyMode,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub private_ip_action: Action,
    #[serde(default)]
    pub unknown_action: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_listen_addr")]
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    #[serde(default = "GeoIpConfig::default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "GeoIpConfig::default_edition_id")]
    pub edition_id: String,
    #[serde(default)]
    pub account_id_file: Option<PathBuf>,
    #[serde(default)]
    pub license_key_file: Option<PathBuf>,
    #[serde(default = "GeoIpConfig::default_update_interval_hours")]
    pub update_interval_hours: u64,
    #[serde(default = "GeoIpConfig::default_download_base_url")]
    pub download_base_url: String,
    #[serde(default = "GeoIpConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "GeoIpConfig::default_max_download_bytes")]
    pub max_download_bytes: u64,
}

impl ServerConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
        }
    }
}

impl GeoIpConfig {
    fn default_db_path() -> PathBuf {
        PathBuf::from("GeoLite2-Country.mmdb")
    }

    fn default_edition_id() -> String {
        "GeoLite2-Country".to_string()
    }

    const fn default_update_interval_hours() -> u64 {
        24
    }

    fn default_download_base_url() -> String {
        "https://download.maxmind.com".to_string()
    }

    const fn default_request_timeout_secs() -> u64 {
        300
    }

    const fn default_max_download_bytes() -> u64 {
        512 * 1024 * 1024
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_hours.saturating_mul(60 * 60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            db_path: Self::default_db_path(),
            edition_id: Self::default_edition_id(),
            account_id_file: None,
            license_key_file: None,
            update_interval_hours: Self::default_update_interval_hours(),
            download_base_url: Self::default_download_base_url(),
            request_timeout_secs: Self::default_request_timeout_secs(),
            max_download_bytes: Self::default_max_download_bytes(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file, then apply `GEOGATE__*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        dotenvy::dotenv().ok();

        let config: Config = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix("GEOGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("policy.countries")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config from {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.geoip.update_interval_hours == 0 {
            bail!("geoip.update_interval_hours must be greater than zero");
        }
        if self.geoip.update_interval_hours > MAX_UPDATE_INTERVAL_HOURS {
            bail!(
                "geoip.update_interval_hours must be at most {MAX_UPDATE_INTERVAL_HOURS}, got {}",
                self.geoip.update_interval_hours
            );
        }
        if self.geoip.edition_id.trim().is_empty() {
            bail!("geoip.edition_id must not be empty");
        }
        if self.geoip.request_timeout_secs == 0 {
            bail!("geoip.request_timeout_secs must be greater than zero");
        }
        if let Some(code) = self
            .policy
            .countries
            .iter()
            .find(|code| code.trim().is_empty())
        {
            bail!("policy.countries contains an empty entry: {code:?}");
        }
        Ok(())
    }

    /// Valid but suspicious settings, to be logged once logging is up
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.policy.mode == PolicyMode::Allowlist && self.policy.countries.is_empty() {
            warnings.push(
                "Allowlist mode with an empty country list denies every public address".to_string(),
            );
        }
        warnings
    }
}

/// MaxMind account credentials, read from two separate secret files
#[derive(Clone)]
pub struct MaxMindCredentials {
    pub account_id: String,
    pub license_key: String,
}

impl MaxMindCredentials {
    pub fn new(account_id: impl Into<String>, license_key: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            license_key: license_key.into(),
        }
    }

    pub fn from_files(account_path: &Path, license_path: &Path) -> anyhow::Result<Self> {
        let account_id = std::fs::read_to_string(account_path).with_context(|| {
            format!("Failed to read MaxMind account ID from {}", account_path.display())
        })?;
        let license_key = std::fs::read_to_string(license_path).with_context(|| {
            format!("Failed to read MaxMind license key from {}", license_path.display())
        })?;

        let account_id = account_id.trim();
        let license_key = license_key.trim();
        if account_id.is_empty() || license_key.is_empty() {
            bail!("MaxMind credentials incomplete");
        }

        Ok(Self::new(account_id, license_key))
    }

    /// Resolve credentials from the file paths in `geoip` config
    pub fn from_config(config: &GeoIpConfig) -> anyhow::Result<Self> {
        let account = config
            .account_id_file
            .as_deref()
            .context("geoip.account_id_file must be set to download datasets")?;
        let license = config
            .license_key_file
            .as_deref()
            .context("geoip.license_key_file must be set to download datasets")?;
        Self::from_files(account, license)
    }
}

impl fmt::Debug for MaxMindCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxMindCredentials")
            .field("account_id", &self.account_id)
            .field("license_key", &"<redacted>")
            .finish()
    }
}
