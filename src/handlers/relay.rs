//! Relay endpoints.
//!
//! - `POST /` and `POST /relay` - relay the request to its destination
//! - `GET /` and `GET /relay` - usage documentation
//! - `OPTIONS` - bare preflight answer (browser preflights are answered by
//!   the CORS layer before reaching here)
//! - anything else - 405 envelope

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::error::AppError;
use crate::middleware::extract_client_ip;
use crate::services::ForwardingContext;
use crate::state::AppState;

/// Relay the request.
///
/// The response is always a relay envelope:
///
/// ```json
/// {
///   "success": true,
///   "status": 201,
///   "data": {"received": true},
///   "duration_ms": 84,
///   "target": "https://hooks.example/in"
/// }
/// ```
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn relay(State(state): State<AppState>, request: Request) -> Response {
    let context = ForwardingContext::from_request(&request);
    debug!(client_ip = %extract_client_ip(&request), "Relay request received");

    state.relay.relay(request, context).await
}

/// Static usage documentation.
#[instrument(skip(state))]
pub async fn usage(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;

    Json(json!({
        "service": "webhook-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Forwards a request to a caller-specified webhook and relays the reply.",
        "endpoints": {
            "POST /relay": "Relay the request body to the destination",
            "GET /health": "Liveness check"
        },
        "destination": {
            "header": ["X-Webhook-URL", "X-Target-URL"],
            "query": "target",
            "body": ["targetUrl", "webhook_url", "target"]
        },
        "auth": {
            "header": "X-Webhook-Auth",
            "query": "webhook_auth",
            "body": "webhook_auth",
            "note": "Sent as 'Authorization: Bearer <token>' unless it already starts with Bearer or Basic"
        },
        "timeout": {
            "header": "X-Webhook-Timeout",
            "body": "timeout",
            "query": "timeout",
            "precedence": "header, then body, then query",
            "default_ms": config.default_timeout.as_millis() as u64,
            "max_ms": config.max_timeout.as_millis() as u64
        },
        "headers": {
            "prefix": "X-Custom-<Name>",
            "body": "headers",
            "precedence": "body 'headers' overrides X-Custom-* on conflict"
        },
        "method": {
            "header": "X-Webhook-Method",
            "allowed": ["POST", "PUT", "PATCH", "DELETE"]
        },
        "content_types": [
            "application/json",
            "application/x-www-form-urlencoded",
            "multipart/form-data"
        ],
        "limits": {
            "max_request_body_size": config.max_request_body_size,
            "max_attachments": config.max_attachments,
            "max_attachment_size": config.max_attachment_size,
            "max_fields": config.max_fields
        },
        "status_mode": config.status_mode.to_string()
    }))
}

/// Answer a bare `OPTIONS` request.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Reject methods the relay endpoint does not serve.
pub async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(format!("{method} is not supported, use POST"))
}
