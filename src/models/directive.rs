//! Relay directives: where and how one inbound request is forwarded.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::Method;

/// Default outbound timeout when the caller does not supply one.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Upper bound applied to caller-supplied timeouts.
pub const MAX_TIMEOUT_MS: u64 = 120_000;

/// Bounded timeout for the outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTimeout {
    /// Effective timeout after clamping.
    pub duration: Duration,
    /// Value supplied by the caller, if any (for logging).
    pub requested_ms: Option<u64>,
}

impl RelayTimeout {
    /// Timeout used when the caller did not ask for one.
    pub fn default_for(default_ms: u64) -> Self {
        Self {
            duration: Duration::from_millis(default_ms),
            requested_ms: None,
        }
    }

    /// Parse a caller-supplied value in milliseconds.
    ///
    /// Values above `max_ms` are clamped down. Zero, negative and
    /// non-numeric values yield `None` so the default applies.
    pub fn from_requested(raw: &str, max_ms: u64) -> Option<Self> {
        let ms = parse_millis(raw)?;
        if ms == 0 {
            return None;
        }
        Some(Self {
            duration: Duration::from_millis(ms.min(max_ms)),
            requested_ms: Some(ms),
        })
    }

    pub fn as_millis(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for RelayTimeout {
    fn default() -> Self {
        Self::default_for(DEFAULT_TIMEOUT_MS)
    }
}

/// Accept integer milliseconds, also when sent as a float (`"5000.0"`).
fn parse_millis(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<u64>() {
        return Some(ms);
    }
    let float = raw.parse::<f64>().ok()?;
    (float.is_finite() && float >= 0.0).then(|| float as u64)
}

/// Where a directive value may come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveSource {
    /// An inbound request header (lowercase name).
    Header(&'static str),
    /// A query string parameter.
    Query(&'static str),
    /// A reserved body field, removed from the forwarded body.
    BodyField(&'static str),
    /// The deployment-wide fallback from configuration. Only the destination
    /// has this source; the fallback auth token follows it.
    Fallback,
}

/// Sources for the destination URL, first match wins.
pub const DESTINATION_SOURCES: &[DirectiveSource] = &[
    DirectiveSource::Header("x-webhook-url"),
    DirectiveSource::Header("x-target-url"),
    DirectiveSource::Query("target"),
    DirectiveSource::BodyField("targetUrl"),
    DirectiveSource::BodyField("webhook_url"),
    DirectiveSource::BodyField("target"),
    DirectiveSource::Fallback,
];

/// Sources for the auth token, first match wins.
///
/// The configured fallback token is not listed: it is only sent along with
/// the fallback destination.
pub const AUTH_SOURCES: &[DirectiveSource] = &[
    DirectiveSource::Header("x-webhook-auth"),
    DirectiveSource::Query("webhook_auth"),
    DirectiveSource::BodyField("webhook_auth"),
];

/// Sources for the timeout in milliseconds, first match wins.
///
/// Unlike destination and auth, the body field wins over the query string.
pub const TIMEOUT_SOURCES: &[DirectiveSource] = &[
    DirectiveSource::Header("x-webhook-timeout"),
    DirectiveSource::BodyField("timeout"),
    DirectiveSource::Query("timeout"),
];

/// Body field carrying a JSON object of header overrides.
pub const HEADERS_FIELD: &str = "headers";

/// Header carrying an outbound method override.
pub const METHOD_HEADER: &str = "x-webhook-method";

/// Inbound header prefix whose remainder names an outbound header.
pub const CUSTOM_HEADER_PREFIX: &str = "x-custom-";

/// Every body field consumed by directive extraction.
pub fn reserved_body_fields() -> impl Iterator<Item = &'static str> {
    DESTINATION_SOURCES
        .iter()
        .chain(AUTH_SOURCES)
        .chain(TIMEOUT_SOURCES)
        .filter_map(|source| match source {
            DirectiveSource::BodyField(name) => Some(*name),
            _ => None,
        })
        .chain(std::iter::once(HEADERS_FIELD))
}

/// Deployment-wide default destination and auth, lowest precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackDirective {
    pub destination_url: Option<String>,
    pub auth_token: Option<String>,
}

/// Relay instructions extracted from one inbound request.
///
/// Built once after every source has been read; never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayDirective {
    /// Raw destination as supplied; validated separately.
    pub destination_url: Option<String>,
    pub auth_token: Option<String>,
    pub timeout: RelayTimeout,
    /// Outbound header overrides keyed by lowercase header name.
    pub extra_headers: BTreeMap<String, String>,
    pub method: Method,
}

impl Default for RelayDirective {
    fn default() -> Self {
        Self {
            destination_url: None,
            auth_token: None,
            timeout: RelayTimeout::default(),
            extra_headers: BTreeMap::new(),
            method: Method::POST,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_from_requested_valid() {
        let timeout = RelayTimeout::from_requested("5000", MAX_TIMEOUT_MS).unwrap();
        assert_eq!(timeout.duration, Duration::from_millis(5000));
        assert_eq!(timeout.requested_ms, Some(5000));
    }

    #[test]
    fn test_timeout_short_values_are_allowed() {
        let timeout = RelayTimeout::from_requested("50", MAX_TIMEOUT_MS).unwrap();
        assert_eq!(timeout.as_millis(), 50);
    }

    #[test]
    fn test_timeout_is_clamped_to_maximum() {
        let timeout = RelayTimeout::from_requested("999999", MAX_TIMEOUT_MS).unwrap();
        assert_eq!(timeout.as_millis(), MAX_TIMEOUT_MS);
        assert_eq!(timeout.requested_ms, Some(999_999));
    }

    #[test]
    fn test_timeout_rejects_zero_and_garbage() {
        assert!(RelayTimeout::from_requested("0", MAX_TIMEOUT_MS).is_none());
        assert!(RelayTimeout::from_requested("-5", MAX_TIMEOUT_MS).is_none());
        assert!(RelayTimeout::from_requested("soon", MAX_TIMEOUT_MS).is_none());
    }

    #[test]
    fn test_timeout_accepts_float_notation() {
        let timeout = RelayTimeout::from_requested("1500.0", MAX_TIMEOUT_MS).unwrap();
        assert_eq!(timeout.as_millis(), 1500);
    }

    #[test]
    fn test_reserved_body_fields() {
        let fields: Vec<_> = reserved_body_fields().collect();
        for name in [
            "targetUrl",
            "webhook_url",
            "target",
            "webhook_auth",
            "timeout",
            "headers",
        ] {
            assert!(fields.contains(&name), "{name} should be reserved");
        }
        assert!(!fields.contains(&"payload"));
    }

    #[test]
    fn test_header_beats_query_beats_body_for_destination() {
        let header = DESTINATION_SOURCES
            .iter()
            .position(|s| *s == DirectiveSource::Header("x-webhook-url"))
            .unwrap();
        let query = DESTINATION_SOURCES
            .iter()
            .position(|s| *s == DirectiveSource::Query("target"))
            .unwrap();
        let body = DESTINATION_SOURCES
            .iter()
            .position(|s| *s == DirectiveSource::BodyField("targetUrl"))
            .unwrap();

        assert!(header < query && query < body);
        assert_eq!(DESTINATION_SOURCES.last(), Some(&DirectiveSource::Fallback));
    }

    #[test]
    fn test_only_destination_has_a_fallback() {
        assert!(!AUTH_SOURCES.contains(&DirectiveSource::Fallback));
        assert!(!TIMEOUT_SOURCES.contains(&DirectiveSource::Fallback));
    }

    #[test]
    fn test_timeout_body_beats_query() {
        assert_eq!(
            TIMEOUT_SOURCES,
            &[
                DirectiveSource::Header("x-webhook-timeout"),
                DirectiveSource::BodyField("timeout"),
                DirectiveSource::Query("timeout"),
            ]
        );
    }
}
