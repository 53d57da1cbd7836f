//! Decide whether the remote dataset is newer than the local copy without
//! transferring it.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use tracing::{debug, warn};

/// Format a timestamp as an HTTP-date (RFC 7231 IMF-fixdate)
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Obsolete HTTP-date forms recipients must still accept (RFC 850, asctime)
const OBSOLETE_HTTP_DATE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Parse an HTTP-date header value in any of its three legal forms
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(time) = DateTime::parse_from_rfc2822(value) {
        return Some(time.with_timezone(&Utc));
    }
    OBSOLETE_HTTP_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|time| time.and_utc())
}

/// Compare timestamps at the one-second resolution HTTP dates carry.
///
/// Without a local copy, or when the remote does not say when it changed,
/// the remote is assumed to be newer.
pub fn remote_is_newer(remote: Option<DateTime<Utc>>, local: Option<DateTime<Utc>>) -> bool {
    match (remote, local) {
        (_, None) | (None, _) => true,
        (Some(remote), Some(local)) => remote.timestamp() > local.timestamp(),
    }
}

/// Interpret the response to a metadata probe.
///
/// `304 Not Modified` and an equal or older `Last-Modified` mean no refresh.
/// Any status other than success also means no refresh this cycle.
pub fn probe_needs_refresh(
    status: StatusCode,
    last_modified: Option<&str>,
    local: Option<DateTime<Utc>>,
) -> bool {
    if status == StatusCode::NOT_MODIFIED {
        debug!("GeoIP database is up to date (not modified)");
        return false;
    }
    if !status.is_success() {
        warn!(%status, "Unexpected status checking GeoIP database");
        return false;
    }

    let remote = last_modified.and_then(parse_http_date);
    let newer = remote_is_newer(remote, local);
    if !newer {
        debug!(
            remote = ?remote,
            local = ?local,
            "GeoIP database is up to date"
        );
    }
    newer
}
