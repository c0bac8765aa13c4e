use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, HOST, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::codec::BodyCodec;
use crate::error::{AppError, AppResult};
use crate::middleware::{REQUEST_ID_HEADER, RequestIdExt, forwarded_for_chain};
use crate::models::{CanonicalBody, OutboundRequest, RelayDirective, RelayResult, TransportFailure};
use crate::transport::Transport;

const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// How long a cancelled transport may take to wind down before its call
/// is dropped.
pub const CANCEL_GRACE: Duration = Duration::from_millis(250);

/// Headers a caller override can never replace.
const PROTECTED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "transfer-encoding",
    X_FORWARDED_HOST,
    X_FORWARDED_FOR,
    REQUEST_ID_HEADER,
];

/// Context about the inbound caller forwarded to the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingContext {
    /// Host the caller addressed the relay with.
    pub host: Option<String>,
    /// Inbound `X-Forwarded-For` chain extended with the peer address.
    pub forwarded_for: Option<String>,
    pub request_id: Option<String>,
}

impl ForwardingContext {
    /// Capture the forwarding context before the request body is consumed.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let host = request
            .headers()
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| request.uri().authority().map(|a| a.to_string()));

        Self {
            host,
            forwarded_for: forwarded_for_chain(request),
            request_id: request.request_id(),
        }
    }
}

/// Builds destination-bound requests and executes them under a deadline.
#[derive(Clone)]
pub struct Composer {
    transport: Arc<dyn Transport>,
    user_agent: String,
}

impl Composer {
    pub fn new(transport: Arc<dyn Transport>, user_agent: impl Into<String>) -> Self {
        Self {
            transport,
            user_agent: user_agent.into(),
        }
    }

    /// Build the outbound request. Inputs are left untouched.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidInput` if the auth token cannot be sent as a header
    /// - `AppError::SerializationError` if the body cannot be re-encoded
    pub fn compose(
        &self,
        directive: &RelayDirective,
        url: Url,
        codec: BodyCodec,
        body: &CanonicalBody,
        context: &ForwardingContext,
    ) -> AppResult<OutboundRequest> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(codec.content_type()),
        );
        insert_text(&mut headers, USER_AGENT, &self.user_agent);

        for (name, value) in &directive.extra_headers {
            if PROTECTED_HEADERS.contains(&name.as_str()) {
                debug!(header = %name, "Ignoring override of a protected header");
                continue;
            }
            let parsed = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            );
            match parsed {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid header override"),
            }
        }

        if let Some(token) = &directive.auth_token {
            let value = HeaderValue::from_str(&authorization_value(token)).map_err(|_| {
                AppError::InvalidInput("auth token contains characters not allowed in a header".into())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        if let Some(host) = &context.host {
            insert_text(&mut headers, HeaderName::from_static(X_FORWARDED_HOST), host);
        }
        if let Some(chain) = &context.forwarded_for {
            insert_text(&mut headers, HeaderName::from_static(X_FORWARDED_FOR), chain);
        }
        if let Some(id) = &context.request_id {
            insert_text(&mut headers, HeaderName::from_static(REQUEST_ID_HEADER), id);
        }

        Ok(OutboundRequest {
            method: directive.method.clone(),
            url,
            headers,
            body: codec.encode(body)?,
        })
    }

    /// Send the request once, bounded by `timeout`.
    ///
    /// When the deadline fires the cancellation token is triggered and the
    /// transport gets [`CANCEL_GRACE`] to release the in-flight call. After
    /// that the call future is dropped, which aborts it either way.
    pub async fn execute(&self, request: OutboundRequest, timeout: Duration) -> RelayResult {
        let cancel = CancellationToken::new();
        let call = self.transport.send(request, cancel.child_token());
        tokio::pin!(call);

        tokio::select! {
            outcome = &mut call => match outcome {
                Ok(response) => RelayResult::from_response(response),
                Err(failure) => RelayResult::TransportFailure { failure, timeout },
            },
            () = tokio::time::sleep(timeout) => {
                cancel.cancel();
                if tokio::time::timeout(CANCEL_GRACE, call).await.is_err() {
                    warn!("Transport ignored cancellation, dropping the call");
                }
                RelayResult::TransportFailure {
                    failure: TransportFailure::timeout(timeout),
                    timeout,
                }
            }
        }
    }
}

/// `Authorization` value for a token: known schemes pass verbatim.
pub fn authorization_value(token: &str) -> String {
    let token = token.trim();
    let lower = token.to_ascii_lowercase();
    if lower.starts_with("bearer ") || lower.starts_with("basic ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

fn insert_text(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!(header = %name, "Skipping header with invalid value"),
    }
}
