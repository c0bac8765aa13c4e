use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::RelayEnvelope;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Relay Failure Classes
///
/// - Input errors (`InvalidInput`, `SizeLimitExceeded`) - the inbound body or
///   a directive value could not be used (400)
/// - Directive errors (`MissingDestination`, `MalformedDestination`) - no
///   usable destination URL (400)
/// - Policy errors (`ForbiddenDestination`) - destination is on the denylist (403)
/// - Transport errors (`Timeout`, `ConnectionFailed`, `UpstreamUnreachable`) -
///   the destination could not be reached (504 / 502)
///
/// A destination that replies with a non-2xx status is not an error: it is
/// relayed back inside a regular envelope.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Size limit exceeded: {0}")]
    SizeLimitExceeded(String),

    #[error("Missing destination URL")]
    MissingDestination,

    #[error("Malformed destination URL: {0}")]
    MalformedDestination(String),

    #[error("Forbidden destination: {0}")]
    ForbiddenDestination(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Destination timed out after {0} ms")]
    Timeout(u64),

    #[error("Failed to connect to destination: {0}")]
    ConnectionFailed(String),

    #[error("Destination request failed: {0}")]
    UpstreamUnreachable(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// HTTP status code the relay answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_)
            | AppError::SizeLimitExceeded(_)
            | AppError::MissingDestination
            | AppError::MalformedDestination(_) => StatusCode::BAD_REQUEST,
            AppError::ForbiddenDestination(_) => StatusCode::FORBIDDEN,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ConnectionFailed(_) | AppError::UpstreamUnreachable(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::SerializationError(_) | AppError::Internal(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable error code placed in the envelope's `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::SizeLimitExceeded(_) => "size_limit_exceeded",
            AppError::MissingDestination => "missing_destination",
            AppError::MalformedDestination(_) => "malformed_destination",
            AppError::ForbiddenDestination(_) => "forbidden_destination",
            AppError::MethodNotAllowed(_) => "method_not_allowed",
            AppError::Timeout(_) => "timeout",
            AppError::ConnectionFailed(_) => "connection_failed",
            AppError::UpstreamUnreachable(_) => "upstream_unreachable",
            AppError::SerializationError(_) => "serialization_error",
            AppError::Internal(_) => "internal_error",
            AppError::ConfigError(_) => "config_error",
        }
    }

    /// Message that is safe to show to the caller.
    ///
    /// Client-caused errors echo their detail; internal errors never expose it.
    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) | AppError::SerializationError(_) => {
                "An internal error occurred while relaying the request.".to_string()
            }
            AppError::ConfigError(_) => "Relay configuration error.".to_string(),
            AppError::MissingDestination => "Missing destination URL. Provide it in the \
                X-Webhook-URL header, the ?target= query parameter, or a targetUrl, \
                webhook_url or target body field."
                .to_string(),
            other => other.to_string(),
        }
    }

    /// Build the relay envelope describing this error.
    pub fn to_envelope(&self) -> RelayEnvelope {
        RelayEnvelope::failure(self.code(), self.public_message())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Relay request failed");
        } else {
            tracing::warn!(error = %self, "Relay request rejected");
        }

        (status, axum::Json(self.to_envelope())).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
