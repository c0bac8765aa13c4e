use std::collections::BTreeMap;

use axum::Json;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::config::StatusMode;
use crate::error::AppError;
use crate::models::{
    ForwardedFile, RelayEnvelope, RelayResult, TransportFailure, TransportFailureKind,
    UpstreamResponse,
};

/// Destination response headers copied into the envelope.
const SELECTED_RESPONSE_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "location",
    "retry-after",
    "etag",
    "x-request-id",
];

/// Diagnostics about what was forwarded, echoed in the envelope.
#[derive(Debug, Clone, Default)]
pub struct RelaySummary {
    pub target: Option<String>,
    pub fields: Vec<String>,
    pub files: Vec<ForwardedFile>,
}

/// Maps a `RelayResult` onto the outward response.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator {
    status_mode: StatusMode,
}

impl Translator {
    pub fn new(status_mode: StatusMode) -> Self {
        Self { status_mode }
    }

    /// Build the outward response. Every result yields exactly one envelope.
    pub fn translate(&self, result: RelayResult, summary: RelaySummary) -> Response {
        let (status, envelope) = self.envelope(result, summary);
        (status, Json(envelope)).into_response()
    }

    /// Outward status and envelope for a result.
    pub fn envelope(&self, result: RelayResult, summary: RelaySummary) -> (StatusCode, RelayEnvelope) {
        match result {
            RelayResult::Success(response) | RelayResult::UpstreamError(response) => {
                let status = match self.status_mode {
                    StatusMode::Mirror if carries_body(response.status) => response.status,
                    StatusMode::Envelope | StatusMode::Mirror => StatusCode::OK,
                };
                (status, reply_envelope(response, summary))
            }
            RelayResult::TransportFailure { failure, timeout } => {
                let error = transport_error(failure, timeout.as_millis());
                let mut envelope = error.to_envelope();
                envelope.target = summary.target;
                (error.status_code(), envelope)
            }
            RelayResult::ValidationFailure(failure) => {
                let error = AppError::from(failure);
                (error.status_code(), error.to_envelope())
            }
        }
    }
}

fn reply_envelope(response: UpstreamResponse, summary: RelaySummary) -> RelayEnvelope {
    let UpstreamResponse {
        status,
        headers,
        body,
        duration,
    } = response;

    RelayEnvelope {
        success: status.is_success(),
        status: Some(status.as_u16()),
        data: response_data(&headers, &body),
        duration_ms: Some(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)),
        target: summary.target,
        headers: Some(selected_headers(&headers)),
        files: (!summary.files.is_empty()).then_some(summary.files),
        fields: Some(summary.fields),
        ..RelayEnvelope::default()
    }
}

/// Whether `status` may carry the envelope. 1xx, 204, 205 and 304 replies
/// are sent without a body, so mirror mode answers 200 for them.
fn carries_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::RESET_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

fn transport_error(failure: TransportFailure, timeout_ms: u128) -> AppError {
    match failure.kind {
        TransportFailureKind::Timeout => {
            AppError::Timeout(u64::try_from(timeout_ms).unwrap_or(u64::MAX))
        }
        TransportFailureKind::ConnectionRefused => AppError::ConnectionFailed(failure.message),
        TransportFailureKind::Other => AppError::UpstreamUnreachable(failure.message),
    }
}

/// Destination body: JSON when declared and valid, otherwise text.
fn response_data(headers: &HeaderMap, body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    if is_json(headers)
        && let Ok(value) = serde_json::from_slice(body)
    {
        return Some(value);
    }
    Some(Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(|essence| {
            let essence = essence.trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}

fn selected_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    SELECTED_RESPONSE_HEADERS
        .iter()
        .filter_map(|name| {
            let value = headers.get(*name)?.to_str().ok()?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
