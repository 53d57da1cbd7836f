//! Allow/deny decision for a single client address

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use tracing::debug;

use crate::config::{Action, PolicyConfig, PolicyMode};
use crate::geoip::{is_private_ip, Country, CountryLookup};

/// Why a request was denied. The strings are part of the endpoint contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    InvalidIp,
    PrivateIp,
    UnknownCountry,
    CountryPolicy,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::InvalidIp => "Invalid IP",
            DenyReason::PrivateIp => "Private IP blocked",
            DenyReason::UnknownCountry => "Unknown country",
            DenyReason::CountryPolicy => "Country policy blocked",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Access policy, normalized once at startup
#[derive(Debug, Clone)]
pub struct Policy {
    mode: PolicyMode,
    countries: HashSet<String>,
    private_ip_action: Action,
    unknown_action: Action,
}

impl Policy {
    pub fn new(
        mode: PolicyMode,
        countries: impl IntoIterator<Item = impl AsRef<str>>,
        private_ip_action: Action,
        unknown_action: Action,
    ) -> Self {
        Self {
            mode,
            countries: countries
                .into_iter()
                .map(|code| code.as_ref().trim().to_ascii_uppercase())
                .collect(),
            private_ip_action,
            unknown_action,
        }
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    /// Case-insensitive membership in the configured country set
    pub fn lists(&self, code: &str) -> bool {
        self.countries.contains(&code.to_ascii_uppercase())
    }

    fn country_decision(&self, code: &str) -> Decision {
        let listed = self.lists(code);
        let allowed = match self.mode {
            PolicyMode::Allowlist => listed,
            PolicyMode::Blocklist => !listed,
        };
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::CountryPolicy)
        }
    }
}

impl From<&PolicyConfig> for Policy {
    fn from(config: &PolicyConfig) -> Self {
        Policy::new(
            config.mode,
            &config.countries,
            config.private_ip_action,
            config.unknown_action,
        )
    }
}

/// Decide whether `address` may pass.
///
/// Private addresses are denied when `private_ip_action` is `deny`; with
/// `allow` they continue to the country lookup like any other address, where
/// they normally resolve to unknown and follow `unknown_action`.
pub fn decide(address: &str, policy: &Policy, classifier: &dyn CountryLookup) -> Decision {
    let Ok(ip) = address.trim().parse::<IpAddr>() else {
        return Decision::Deny(DenyReason::InvalidIp);
    };

    if is_private_ip(ip) && policy.private_ip_action == Action::Deny {
        return Decision::Deny(DenyReason::PrivateIp);
    }

    let country = classifier.lookup(ip);
    debug!(%ip, country = %country, "Resolved country");

    match country {
        Country::Unknown => match policy.unknown_action {
            Action::Allow => Decision::Allow,
            Action::Deny => Decision::Deny(DenyReason::UnknownCountry),
        },
        Country::Known(code) => policy.country_decision(&code),
    }
}
