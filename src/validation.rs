//! Destination URL validation and private-network denylist.
//!
//! # Policy
//!
//! A destination must be an absolute `http`/`https` URL with a host. Hosts
//! that name the relay's own network are refused:
//!
//! - `localhost` and any `*.localhost` name
//! - IPv4: `127.0.0.0/8`, `0.0.0.0/8`, `10.0.0.0/8`, `172.16.0.0/12`,
//!   `192.168.0.0/16`, `169.254.0.0/16`
//! - IPv6: `::1`, `::`, `fc00::/7`, `fe80::/10`, and IPv4-mapped addresses
//!   whose embedded IPv4 address is refused
//!
//! Matching works on the parsed host, never on the raw string. The WHATWG
//! parser in the `url` crate normalizes alternate IPv4 spellings
//! (`2130706433`, `0x7f.1`, `127.1`) into dotted form before matching, and a
//! public name that merely contains `10.` is not affected.
//!
//! # Limits
//!
//! This is best-effort SSRF mitigation, not a guarantee. A DNS name that
//! resolves to a private address, DNS rebinding and IPv6 transition forms
//! other than IPv4-mapped are not caught here. Redirects are disabled on the
//! outbound client so an accepted host cannot bounce the relay elsewhere.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tracing::debug;
use url::{Host, Url};

use crate::models::ValidationFailure;

/// Maximum accepted length of a destination URL.
pub const MAX_DESTINATION_LENGTH: usize = 2048;

/// Ranges destinations may not point into.
pub const FORBIDDEN_RANGES: &[&str] = &[
    "127.0.0.0/8",
    "0.0.0.0/8",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "169.254.0.0/16",
    "::1/128",
    "::/128",
    "fc00::/7",
    "fe80::/10",
];

/// Parsed CIDR network range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    /// Network address
    network: IpAddr,
    /// Prefix length (e.g., 24 for /24)
    prefix_len: u8,
}

impl CidrRange {
    /// Parse a CIDR notation string (e.g., "10.0.0.0/8" or "::1/128").
    ///
    /// A bare address is treated as a single-host range. Returns `None` if
    /// the format is invalid.
    pub fn parse(cidr: &str) -> Option<Self> {
        let (addr, prefix) = match cidr.trim().split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (cidr.trim(), None),
        };

        let network: IpAddr = addr.parse().ok()?;
        let max_prefix = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };

        let prefix_len = match prefix {
            Some(p) => p.parse().ok()?,
            None => max_prefix,
        };

        if prefix_len > max_prefix {
            return None;
        }

        Some(Self {
            network,
            prefix_len,
        })
    }

    /// Check if an IP address is contained within this CIDR range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - self.prefix_len)
                };
                (u32::from(*net) & mask) == (u32::from(*addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u128::MAX << (128 - self.prefix_len)
                };
                (u128::from(*net) & mask) == (u128::from(*addr) & mask)
            }
            // IPv4 and IPv6 don't match
            _ => false,
        }
    }
}

/// Denylist of private and internal network locations.
#[derive(Debug, Clone)]
pub struct DestinationPolicy {
    ranges: Vec<CidrRange>,
    allow_private: bool,
}

impl Default for DestinationPolicy {
    fn default() -> Self {
        Self::new(false)
    }
}

impl DestinationPolicy {
    /// Build the policy. With `allow_private` the range checks are skipped;
    /// scheme and host checks still apply.
    pub fn new(allow_private: bool) -> Self {
        Self {
            ranges: FORBIDDEN_RANGES
                .iter()
                .filter_map(|cidr| CidrRange::parse(cidr))
                .collect(),
            allow_private,
        }
    }

    /// Check whether an address falls into a forbidden range.
    pub fn is_forbidden_ip(&self, ip: &IpAddr) -> bool {
        if let IpAddr::V6(v6) = ip
            && let Some(v4) = ipv4_mapped(v6)
        {
            return self.is_forbidden_ip(&IpAddr::V4(v4));
        }
        self.ranges.iter().any(|range| range.contains(ip))
    }

    /// Check whether a parsed host is forbidden.
    fn is_forbidden_host(&self, host: &Host<&str>) -> bool {
        match host {
            Host::Domain(name) => is_local_name(name),
            Host::Ipv4(ip) => self.is_forbidden_ip(&IpAddr::V4(*ip)),
            Host::Ipv6(ip) => self.is_forbidden_ip(&IpAddr::V6(*ip)),
        }
    }

    /// Validate a raw destination string.
    ///
    /// This is the only place a destination is parsed and checked; callers
    /// must use the returned `Url` from here on.
    pub fn validate(&self, raw: Option<&str>) -> Result<Url, ValidationFailure> {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(ValidationFailure::MissingDestination);
        }

        if raw.len() > MAX_DESTINATION_LENGTH {
            return Err(ValidationFailure::MalformedDestination(format!(
                "destination URL exceeds {MAX_DESTINATION_LENGTH} characters"
            )));
        }

        let url = Url::parse(raw).map_err(|e| {
            ValidationFailure::MalformedDestination(format!("'{raw}' is not an absolute URL: {e}"))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationFailure::MalformedDestination(format!(
                "unsupported scheme '{}', expected http or https",
                url.scheme()
            )));
        }

        let Some(host) = url.host() else {
            return Err(ValidationFailure::MalformedDestination(
                "destination URL has no host".to_string(),
            ));
        };

        if !url.username().is_empty() || url.password().is_some() {
            return Err(ValidationFailure::MalformedDestination(
                "credentials in the destination URL are not supported; use X-Webhook-Auth"
                    .to_string(),
            ));
        }

        if !self.allow_private && self.is_forbidden_host(&host) {
            debug!(host = %host, "Destination refused by private network denylist");
            return Err(ValidationFailure::ForbiddenDestination(format!(
                "host '{host}' is a private or internal address"
            )));
        }

        Ok(url)
    }
}

/// `localhost`, `*.localhost`, and the same with a trailing dot.
fn is_local_name(name: &str) -> bool {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    name == "localhost" || name.ends_with(".localhost")
}

/// Extract the IPv4 address from `::ffff:a.b.c.d`.
fn ipv4_mapped(ip: &Ipv6Addr) -> Option<Ipv4Addr> {
    match ip.segments() {
        [0, 0, 0, 0, 0, 0xffff, hi, lo] => {
            let [a, b] = hi.to_be_bytes();
            let [c, d] = lo.to_be_bytes();
            Some(Ipv4Addr::new(a, b, c, d))
        }
        _ => None,
    }
}
