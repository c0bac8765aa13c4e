//! Outbound request and relay outcome types.

use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use url::Url;

use super::CanonicalBody;
use crate::error::AppError;

/// Body of the destination-bound request.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    /// Already-encoded JSON or url-encoded bytes.
    Bytes(Bytes),
    /// Fields and attachments, encoded as multipart by the transport.
    Multipart(CanonicalBody),
}

/// Fully composed destination-bound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: OutboundBody,
}

/// What the destination sent back.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Time from sending the request to receiving the full body.
    pub duration: Duration,
}

/// Why the destination could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    Timeout,
    ConnectionRefused,
    Other,
}

/// A failed attempt to reach the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: TransportFailureKind::Timeout,
            message: format!("no response within {} ms", after.as_millis()),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: TransportFailureKind::ConnectionRefused,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: TransportFailureKind::Other,
            message: message.into(),
        }
    }
}

/// Reasons a destination is rejected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    MissingDestination,
    MalformedDestination(String),
    ForbiddenDestination(String),
}

impl From<ValidationFailure> for AppError {
    fn from(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::MissingDestination => AppError::MissingDestination,
            ValidationFailure::MalformedDestination(reason) => {
                AppError::MalformedDestination(reason)
            }
            ValidationFailure::ForbiddenDestination(reason) => {
                AppError::ForbiddenDestination(reason)
            }
        }
    }
}

/// The single outcome of one relay attempt.
#[derive(Debug, Clone)]
pub enum RelayResult {
    /// Destination replied with a 2xx status.
    Success(UpstreamResponse),
    /// Destination replied with any other status.
    UpstreamError(UpstreamResponse),
    /// Destination could not be reached.
    TransportFailure {
        failure: TransportFailure,
        timeout: Duration,
    },
    /// Destination was rejected before sending.
    ValidationFailure(ValidationFailure),
}

impl RelayResult {
    /// Classify a received response by its status.
    pub fn from_response(response: UpstreamResponse) -> Self {
        if response.status.is_success() {
            RelayResult::Success(response)
        } else {
            RelayResult::UpstreamError(response)
        }
    }

    /// Short label for logs and metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            RelayResult::Success(_) => "success",
            RelayResult::UpstreamError(_) => "upstream_error",
            RelayResult::TransportFailure { failure, .. } => match failure.kind {
                TransportFailureKind::Timeout => "timeout",
                TransportFailureKind::ConnectionRefused => "connection_failed",
                TransportFailureKind::Other => "transport_error",
            },
            RelayResult::ValidationFailure(_) => "rejected",
        }
    }
}
