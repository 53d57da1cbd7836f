use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::freshness::{format_http_date, probe_needs_refresh};
use crate::config::{GeoIpConfig, MaxMindCredentials};
use crate::error::UpdateError;

/// Where refreshed datasets come from
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Lightweight probe: is the remote dataset newer than `local`?
    ///
    /// Probe failures report `false` so the cycle is retried on the next tick.
    async fn needs_refresh(&self, local: Option<DateTime<Utc>>) -> bool;

    /// Stream the compressed dataset archive into `dest`, returning the byte count
    async fn download(&self, dest: &mut tokio::fs::File) -> Result<u64, UpdateError>;
}

/// MaxMind download service, authenticated with account ID and license key
pub struct MaxMindSource {
    client: reqwest::Client,
    url: String,
    credentials: MaxMindCredentials,
    max_download_bytes: u64,
}

impl MaxMindSource {
    pub fn new(config: &GeoIpConfig, credentials: MaxMindCredentials) -> Result<Self, UpdateError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            url: Self::download_url(&config.download_base_url, &config.edition_id),
            credentials,
            max_download_bytes: config.max_download_bytes,
        })
    }

    pub fn download_url(base_url: &str, edition_id: &str) -> String {
        format!(
            "{}/geoip/databases/{}/download?suffix=zip",
            base_url.trim_end_matches('/'),
            edition_id
        )
    }

    fn check_size(&self, size: u64) -> Result<(), UpdateError> {
        if size > self.max_download_bytes {
            return Err(UpdateError::TooLarge {
                size,
                limit: self.max_download_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DatasetSource for MaxMindSource {
    async fn needs_refresh(&self, local: Option<DateTime<Utc>>) -> bool {
        let mut request = self.client.head(&self.url).basic_auth(
            &self.credentials.account_id,
            Some(&self.credentials.license_key),
        );
        if let Some(local) = local {
            request = request.header(IF_MODIFIED_SINCE, format_http_date(local));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %self.url, error = %err, "Failed to check GeoIP database freshness");
                return false;
            }
        };

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok());
        probe_needs_refresh(response.status(), last_modified, local)
    }

    async fn download(&self, dest: &mut tokio::fs::File) -> Result<u64, UpdateError> {
        let mut response = self
            .client
            .get(&self.url)
            .basic_auth(
                &self.credentials.account_id,
                Some(&self.credentials.license_key),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, %status, "GeoIP database download failed");
            return Err(UpdateError::Status(status));
        }

        if let Some(length) = response.content_length() {
            self.check_size(length)?;
        }

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            written += chunk.len() as u64;
            // Content-Length may be missing or wrong
            self.check_size(written)?;
            dest.write_all(&chunk).await?;
        }
        dest.flush().await?;

        debug!(url = %self.url, bytes = written, "Downloaded GeoIP archive");
        Ok(written)
    }
}
