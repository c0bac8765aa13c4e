//! Request ID middleware for correlating relayed calls.
//!
//! Every inbound request gets an `X-Request-Id`: the caller's own if it is
//! usable, a fresh UUIDv4 otherwise. The id is echoed on the response and
//! forwarded to the destination, so one id follows a webhook across the
//! caller, the relay and the receiving endpoint.
//!
//! ```bash
//! curl -H "X-Request-Id: order-4711" -H "X-Webhook-URL: https://hooks.example/in" \
//!      -d '{"event":"paid"}' http://localhost:3000/relay
//! ```

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::{Span, debug};
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller-supplied ids longer than this are replaced.
pub const MAX_REQUEST_ID_LENGTH: usize = 128;

#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let request_id = extract_or_generate_request_id(&req);

        // Overwrite so handlers and the outbound request see the sanitized id.
        req.headers_mut()
            .insert(REQUEST_ID_HEADER, request_id.clone());

        if let Ok(id) = request_id.to_str() {
            Span::current().record("request_id", id);
            debug!(request_id = %id, "Processing request");
        }

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            response
                .headers_mut()
                .insert(REQUEST_ID_HEADER, request_id);
            Ok(response)
        })
    }
}

/// Keep a usable caller id, otherwise mint a new one.
///
/// Usable means non-empty, at most [`MAX_REQUEST_ID_LENGTH`] bytes, and only
/// visible ASCII, since the id is copied into headers sent to third parties.
fn extract_or_generate_request_id<B>(req: &Request<B>) -> HeaderValue {
    if let Some(value) = req.headers().get(REQUEST_ID_HEADER)
        && is_usable_id(value.as_bytes())
    {
        return value.clone();
    }

    // A hyphenated UUID is always a valid header value.
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

fn is_usable_id(id: &[u8]) -> bool {
    !id.is_empty() && id.len() <= MAX_REQUEST_ID_LENGTH && id.iter().all(u8::is_ascii_graphic)
}

/// Extension trait to extract request ID from requests.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<String>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<String> {
        self.headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}
