use std::time::Instant;

use async_trait::async_trait;
use axum::http::header::CONTENT_TYPE;
use bytes::BytesMut;
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Transport;
use crate::codec::MULTIPART_FORM_DATA;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    CanonicalBody, OutboundBody, OutboundRequest, TransportFailure, TransportFailureKind,
    UpstreamResponse,
};

/// `reqwest`-backed transport with a pooled client.
///
/// Redirects are never followed: a 3xx from the destination is relayed to
/// the caller like any other status.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    max_response_size: usize,
}

impl HttpTransport {
    /// Build the transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the HTTP client cannot be created
    /// (e.g., TLS backend initialization failure).
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_response_size: config.max_upstream_response_size,
        })
    }

    async fn exchange(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportFailure> {
        let started = Instant::now();
        let OutboundRequest {
            method,
            url,
            mut headers,
            body,
        } = request;

        let mut builder = self.client.request(method, url);
        builder = match body {
            OutboundBody::Bytes(bytes) => builder.body(bytes),
            OutboundBody::Multipart(body) => {
                // Keep the boundary-carrying header reqwest generates unless
                // the caller explicitly replaced the content type.
                if headers
                    .get(CONTENT_TYPE)
                    .is_some_and(|ct| ct.as_bytes() == MULTIPART_FORM_DATA.as_bytes())
                {
                    headers.remove(CONTENT_TYPE);
                }
                builder.multipart(build_form(body))
            }
        };

        let mut response = builder.headers(headers).send().await.map_err(classify)?;

        let status = response.status();
        let headers = response.headers().clone();
        let mut buffer = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            if buffer.len() + chunk.len() > self.max_response_size {
                return Err(TransportFailure::other(format!(
                    "destination response exceeds {} bytes",
                    self.max_response_size
                )));
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(UpstreamResponse {
            status,
            headers,
            body: buffer.freeze(),
            duration: started.elapsed(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: OutboundRequest,
        cancel: CancellationToken,
    ) -> Result<UpstreamResponse, TransportFailure> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                // Dropping the exchange future closes the in-flight connection.
                debug!("Outbound request cancelled");
                Err(TransportFailure {
                    kind: TransportFailureKind::Timeout,
                    message: "request cancelled".to_string(),
                })
            }
            outcome = self.exchange(request) => outcome,
        }
    }
}

/// Rebuild a multipart form with the same fields and attachments.
fn build_form(body: CanonicalBody) -> Form {
    let mut form = Form::new();

    for (name, value) in body.fields {
        for text in value.texts() {
            form = form.text(name.clone(), text);
        }
    }

    for attachment in body.attachments {
        let part = |bytes: &bytes::Bytes| {
            Part::bytes(bytes.to_vec()).file_name(attachment.file_name.clone())
        };
        let part = match part(&attachment.bytes).mime_str(&attachment.mime_type) {
            Ok(part) => part,
            Err(e) => {
                warn!(
                    file = %attachment.file_name,
                    mime_type = %attachment.mime_type,
                    error = %e,
                    "Invalid attachment MIME type, sending without one"
                );
                part(&attachment.bytes)
            }
        };
        form = form.part(attachment.field_name, part);
    }

    form
}

/// Map a client error onto the transport failure kinds.
fn classify(e: reqwest::Error) -> TransportFailure {
    if e.is_timeout() {
        TransportFailure {
            kind: TransportFailureKind::Timeout,
            message: e.to_string(),
        }
    } else if e.is_connect() {
        TransportFailure::connection(describe(&e))
    } else {
        TransportFailure::other(describe(&e))
    }
}

/// Error text including its source chain, which carries the useful detail
/// (e.g. "connection refused", "dns error").
fn describe(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
