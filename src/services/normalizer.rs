use std::collections::BTreeMap;

use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method};
use serde_json::Value;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::codec::{BodyCodec, BodyLimits};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    AUTH_SOURCES, CUSTOM_HEADER_PREFIX, CanonicalBody, DESTINATION_SOURCES, DirectiveSource,
    FallbackDirective, FieldValue, HEADERS_FIELD, METHOD_HEADER, RelayDirective, RelayTimeout,
    TIMEOUT_SOURCES, reserved_body_fields,
};

/// Output of input normalization.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    /// Codec chosen from the inbound content type, reused for forwarding.
    pub codec: BodyCodec,
    /// Body with every reserved directive field removed.
    pub body: CanonicalBody,
    pub directive: RelayDirective,
}

/// Decodes inbound requests and extracts their relay directive.
#[derive(Debug, Clone)]
pub struct Normalizer {
    limits: BodyLimits,
    fallback: FallbackDirective,
    default_timeout_ms: u64,
    max_timeout_ms: u64,
}

/// Everything a directive source can read from.
struct DirectiveInputs<'a> {
    headers: &'a HeaderMap,
    query: &'a BTreeMap<String, String>,
    body: &'a CanonicalBody,
}

impl Normalizer {
    pub fn new(config: &Config) -> Self {
        Self {
            limits: BodyLimits::from(config),
            fallback: config.fallback_directive(),
            default_timeout_ms: millis(config.default_timeout),
            max_timeout_ms: millis(config.max_timeout),
        }
    }

    /// Decode the inbound body and build the directive.
    ///
    /// # Errors
    ///
    /// - `AppError::SizeLimitExceeded` if the body crosses a configured bound
    /// - `AppError::InvalidInput` for an unreadable multipart body or an
    ///   unsupported method override
    pub async fn normalize(&self, request: Request) -> AppResult<NormalizedRequest> {
        let headers = request.headers().clone();
        let query = parse_query(request.uri().query());
        let codec = BodyCodec::from_content_type(
            headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        );

        let mut body = codec.decode(request, &self.limits).await?;
        debug!(
            codec = codec.name(),
            fields = body.field_count(),
            attachments = body.attachments.len(),
            "Decoded inbound body"
        );

        let directive = self.extract_directive(&headers, &query, &mut body)?;

        Ok(NormalizedRequest {
            codec,
            body,
            directive,
        })
    }

    /// Build the directive from headers, query and body, then strip the
    /// reserved fields from the body.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if `X-Webhook-Method` names an
    /// unsupported method.
    pub fn extract_directive(
        &self,
        headers: &HeaderMap,
        query: &BTreeMap<String, String>,
        body: &mut CanonicalBody,
    ) -> AppResult<RelayDirective> {
        let inputs = DirectiveInputs {
            headers,
            query,
            body,
        };

        let destination = resolve(
            DESTINATION_SOURCES,
            &inputs,
            self.fallback.destination_url.as_deref(),
        );
        // The fallback token belongs to the fallback destination and is never
        // sent to a destination the caller chose.
        let uses_fallback = matches!(destination, Some((DirectiveSource::Fallback, _)));
        let auth_token = resolve(AUTH_SOURCES, &inputs, None)
            .map(|(_, token)| token)
            .or_else(|| {
                uses_fallback
                    .then(|| self.fallback.auth_token.clone())
                    .flatten()
            });
        let destination_url = destination.map(|(_, url)| url);
        let timeout = resolve(TIMEOUT_SOURCES, &inputs, None)
            .map(|(_, raw)| raw)
            .and_then(|raw| {
                let timeout = RelayTimeout::from_requested(&raw, self.max_timeout_ms);
                if timeout.is_none() {
                    debug!(value = %raw, "Ignoring unusable timeout");
                }
                timeout
            })
            .unwrap_or_else(|| RelayTimeout::default_for(self.default_timeout_ms));
        let method = parse_method(headers)?;

        let mut extra_headers = custom_headers(headers);
        if let Some(overrides) = body.take_field(HEADERS_FIELD) {
            // Body overrides are applied last so they win over X-Custom-*.
            extra_headers.extend(header_overrides(&overrides));
        }
        for field in reserved_body_fields() {
            body.take_field(field);
        }

        Ok(RelayDirective {
            destination_url,
            auth_token,
            timeout,
            extra_headers,
            method,
        })
    }
}

/// First non-empty value across `sources`, in order, with the source it
/// came from.
fn resolve(
    sources: &[DirectiveSource],
    inputs: &DirectiveInputs<'_>,
    fallback: Option<&str>,
) -> Option<(DirectiveSource, String)> {
    sources.iter().find_map(|source| {
        resolve_one(*source, inputs, fallback).map(|value| (*source, value))
    })
}

fn resolve_one(
    source: DirectiveSource,
    inputs: &DirectiveInputs<'_>,
    fallback: Option<&str>,
) -> Option<String> {
    match source {
        DirectiveSource::Header(name) => header_text(inputs.headers, name),
        DirectiveSource::Query(name) => inputs
            .query
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        DirectiveSource::BodyField(name) => {
            inputs.body.fields.get(name).and_then(FieldValue::first_text)
        }
        DirectiveSource::Fallback => fallback.map(str::to_string),
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Query parameters; the first occurrence of a key wins.
fn parse_query(query: Option<&str>) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    if let Some(query) = query {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }
    params
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_method(headers: &HeaderMap) -> AppResult<Method> {
    let Some(raw) = header_text(headers, METHOD_HEADER) else {
        return Ok(Method::POST);
    };

    match raw.to_ascii_uppercase().as_str() {
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(AppError::InvalidInput(format!(
            "unsupported X-Webhook-Method '{raw}', expected POST, PUT, PATCH or DELETE"
        ))),
    }
}

/// `X-Custom-<Name>: value` inbound headers, keyed by lowercase `<name>`.
fn custom_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let target = name.as_str().strip_prefix(CUSTOM_HEADER_PREFIX)?;
            if target.is_empty() {
                return None;
            }
            let value = value.to_str().ok()?;
            Some((target.to_string(), value.to_string()))
        })
        .collect()
}

/// Header overrides from the `headers` body field.
///
/// JSON bodies carry an object; form and multipart bodies carry the same
/// object as a JSON-encoded string.
fn header_overrides(field: &FieldValue) -> Vec<(String, String)> {
    let objects: Vec<Value> = match field {
        FieldValue::Json(value) => vec![value.clone()],
        FieldValue::Text(_) | FieldValue::List(_) => field
            .texts()
            .iter()
            .filter_map(|text| match serde_json::from_str::<Value>(text) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(error = %e, "Ignoring header overrides that are not valid JSON");
                    None
                }
            })
            .collect(),
    };

    let mut overrides = Vec::new();
    for object in objects {
        let Value::Object(map) = object else {
            warn!("Ignoring header overrides that are not a JSON object");
            continue;
        };
        for (name, value) in map {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s,
                other => other.to_string(),
            };
            overrides.push((name.to_ascii_lowercase(), value));
        }
    }
    overrides
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::json;
    use std::time::Duration;

    fn normalizer() -> Normalizer {
        Normalizer::new(&Config::default())
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    fn json_body(value: Value) -> CanonicalBody {
        match value {
            Value::Object(object) => CanonicalBody::from_json_object(object),
            _ => panic!("test body must be an object"),
        }
    }

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_header_wins_over_query_and_body() {
        let mut body = json_body(json!({"targetUrl": "https://body.example/hook"}));
        let directive = normalizer()
            .extract_directive(
                &headers(&[("x-webhook-url", "https://header.example/hook")]),
                &query(&[("target", "https://query.example/hook")]),
                &mut body,
            )
            .unwrap();

        assert_eq!(
            directive.destination_url.as_deref(),
            Some("https://header.example/hook")
        );
    }

    #[test]
    fn test_query_wins_over_body() {
        let mut body = json_body(json!({"webhook_url": "https://body.example/hook"}));
        let directive = normalizer()
            .extract_directive(
                &HeaderMap::new(),
                &query(&[("target", "https://query.example/hook")]),
                &mut body,
            )
            .unwrap();

        assert_eq!(
            directive.destination_url.as_deref(),
            Some("https://query.example/hook")
        );
    }

    #[test]
    fn test_body_field_spellings() {
        for field in ["targetUrl", "webhook_url", "target"] {
            let mut body = json_body(json!({ field: "https://body.example/hook" }));
            let directive = normalizer()
                .extract_directive(&HeaderMap::new(), &BTreeMap::new(), &mut body)
                .unwrap();
            assert_eq!(
                directive.destination_url.as_deref(),
                Some("https://body.example/hook"),
                "field {field}"
            );
        }
    }

    #[test]
    fn test_fallback_has_lowest_precedence() {
        let config = Config {
            fallback_destination: Some("https://fallback.example/hook".into()),
            fallback_auth: Some("fallback-token".into()),
            ..Config::default()
        };
        let normalizer = Normalizer::new(&config);

        let mut empty = CanonicalBody::default();
        let directive = normalizer
            .extract_directive(&HeaderMap::new(), &BTreeMap::new(), &mut empty)
            .unwrap();
        assert_eq!(
            directive.destination_url.as_deref(),
            Some("https://fallback.example/hook")
        );
        assert_eq!(directive.auth_token.as_deref(), Some("fallback-token"));

        let mut body = json_body(json!({"target": "https://explicit.example/hook"}));
        let directive = normalizer
            .extract_directive(&HeaderMap::new(), &BTreeMap::new(), &mut body)
            .unwrap();
        assert_eq!(
            directive.destination_url.as_deref(),
            Some("https://explicit.example/hook")
        );
    }

    #[test]
    fn test_fallback_auth_is_not_sent_to_caller_destination() {
        let config = Config {
            fallback_destination: Some("https://fallback.example/hook".into()),
            fallback_auth: Some("deployment-secret".into()),
            ..Config::default()
        };
        let normalizer = Normalizer::new(&config);

        let directive = normalizer
            .extract_directive(
                &headers(&[("x-webhook-url", "https://other.example/collect")]),
                &BTreeMap::new(),
                &mut CanonicalBody::default(),
            )
            .unwrap();
        assert_eq!(
            directive.destination_url.as_deref(),
            Some("https://other.example/collect")
        );
        assert_eq!(directive.auth_token, None);

        let mut body = json_body(json!({"target": "https://other.example/collect"}));
        let directive = normalizer
            .extract_directive(&HeaderMap::new(), &BTreeMap::new(), &mut body)
            .unwrap();
        assert_eq!(directive.auth_token, None);
    }

    #[test]
    fn test_caller_auth_wins_on_fallback_destination() {
        let config = Config {
            fallback_destination: Some("https://fallback.example/hook".into()),
            fallback_auth: Some("deployment-secret".into()),
            ..Config::default()
        };

        let directive = Normalizer::new(&config)
            .extract_directive(
                &headers(&[("x-webhook-auth", "caller-token")]),
                &BTreeMap::new(),
                &mut CanonicalBody::default(),
            )
            .unwrap();

        assert_eq!(
            directive.destination_url.as_deref(),
            Some("https://fallback.example/hook")
        );
        assert_eq!(directive.auth_token.as_deref(), Some("caller-token"));
    }

    #[test]
    fn test_reserved_fields_are_removed() {
        let mut body = json_body(json!({
            "target": "https://a.example",
            "webhook_auth": "secret",
            "timeout": 5000,
            "headers": {"X-Trace": "1"},
            "event": "signup"
        }));
        let directive = normalizer()
            .extract_directive(&HeaderMap::new(), &BTreeMap::new(), &mut body)
            .unwrap();

        assert_eq!(body.field_names(), vec!["event".to_string()]);
        assert_eq!(directive.auth_token.as_deref(), Some("secret"));
        assert_eq!(directive.timeout.duration, Duration::from_millis(5000));
        assert_eq!(
            directive.extra_headers.get("x-trace").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn test_unused_reserved_fields_are_still_removed() {
        // The header supplies the destination, but the body spelling must not leak through.
        let mut body = json_body(json!({"targetUrl": "https://body.example", "n": 1}));
        normalizer()
            .extract_directive(
                &headers(&[("x-webhook-url", "https://header.example")]),
                &BTreeMap::new(),
                &mut body,
            )
            .unwrap();

        assert_eq!(body.field_names(), vec!["n".to_string()]);
    }

    #[test]
    fn test_body_header_overrides_win_over_custom_headers() {
        let mut body = json_body(json!({"headers": {"X-Api-Version": "body"}}));
        let directive = normalizer()
            .extract_directive(
                &headers(&[
                    ("x-custom-x-api-version", "header"),
                    ("x-custom-x-tenant", "acme"),
                ]),
                &BTreeMap::new(),
                &mut body,
            )
            .unwrap();

        assert_eq!(
            directive.extra_headers.get("x-api-version").map(String::as_str),
            Some("body")
        );
        assert_eq!(
            directive.extra_headers.get("x-tenant").map(String::as_str),
            Some("acme")
        );
    }

    #[test]
    fn test_form_header_overrides_are_json_text() {
        let mut body = CanonicalBody::default();
        body.push_text("headers", r#"{"X-Signature": "abc"}"#);
        let directive = normalizer()
            .extract_directive(&HeaderMap::new(), &BTreeMap::new(), &mut body)
            .unwrap();

        assert_eq!(
            directive.extra_headers.get("x-signature").map(String::as_str),
            Some("abc")
        );
        assert!(body.is_empty());
    }

    #[test]
    fn test_timeout_header_is_clamped() {
        let directive = normalizer()
            .extract_directive(
                &headers(&[("x-webhook-timeout", "999999999")]),
                &BTreeMap::new(),
                &mut CanonicalBody::default(),
            )
            .unwrap();

        assert_eq!(directive.timeout.duration, Config::default().max_timeout);
    }

    #[test]
    fn test_body_timeout_wins_over_query() {
        let mut body = json_body(json!({"timeout": 5000}));
        let directive = normalizer()
            .extract_directive(&HeaderMap::new(), &query(&[("timeout", "7000")]), &mut body)
            .unwrap();

        assert_eq!(directive.timeout.as_millis(), 5000);
        assert!(body.is_empty());

        let directive = normalizer()
            .extract_directive(
                &HeaderMap::new(),
                &query(&[("timeout", "7000")]),
                &mut CanonicalBody::default(),
            )
            .unwrap();
        assert_eq!(directive.timeout.as_millis(), 7000);
    }

    #[test]
    fn test_garbage_timeout_uses_default() {
        let directive = normalizer()
            .extract_directive(
                &HeaderMap::new(),
                &query(&[("timeout", "soon")]),
                &mut CanonicalBody::default(),
            )
            .unwrap();

        assert_eq!(directive.timeout.duration, Config::default().default_timeout);
        assert_eq!(directive.timeout.requested_ms, None);
    }

    #[test]
    fn test_method_override() {
        let directive = normalizer()
            .extract_directive(
                &headers(&[("x-webhook-method", "put")]),
                &BTreeMap::new(),
                &mut CanonicalBody::default(),
            )
            .unwrap();
        assert_eq!(directive.method, Method::PUT);

        let result = normalizer().extract_directive(
            &headers(&[("x-webhook-method", "TRACE")]),
            &BTreeMap::new(),
            &mut CanonicalBody::default(),
        );
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_query_first_occurrence_wins() {
        let params = parse_query(Some("target=https%3A%2F%2Fa.example&target=https://b.example"));
        assert_eq!(
            params.get("target").map(String::as_str),
            Some("https://a.example")
        );
    }

    #[tokio::test]
    async fn test_normalize_form_request() {
        let request = Request::builder()
            .uri("/?target=https://hooks.example/in")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("name=Ada&webhook_auth=tok"))
            .unwrap();

        let normalized = normalizer().normalize(request).await.unwrap();

        assert_eq!(normalized.codec, BodyCodec::UrlEncoded);
        assert_eq!(normalized.body.field_names(), vec!["name".to_string()]);
        assert_eq!(
            normalized.directive.destination_url.as_deref(),
            Some("https://hooks.example/in")
        );
        assert_eq!(normalized.directive.auth_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_normalize_malformed_json_is_empty_body() {
        let request = Request::builder()
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let normalized = normalizer().normalize(request).await.unwrap();

        assert!(normalized.body.is_empty());
        assert_eq!(normalized.directive.destination_url, None);
    }
}
