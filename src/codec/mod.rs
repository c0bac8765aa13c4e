//! Body codecs: one per inbound content type, used both to decode the
//! inbound payload and to re-encode it for the destination.
//!
//! The codec is chosen once from the inbound `Content-Type` and carried
//! through the pipeline, so forwarding always uses the same representation
//! the caller sent.
//!
//! | Inbound content type                | Codec        | Outbound encoding     |
//! |-------------------------------------|--------------|-----------------------|
//! | `application/json`, `*+json`        | `Json`       | JSON document         |
//! | `application/x-www-form-urlencoded` | `UrlEncoded` | url-encoded pairs     |
//! | `multipart/form-data`               | `Multipart`  | rebuilt multipart     |
//! | anything else or missing            | `Json`       | JSON document         |

pub mod form;
pub mod json;
mod multipart;

use axum::body::Body;
use axum::extract::Request;
use bytes::Bytes;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::{CanonicalBody, OutboundBody};

pub use multipart::MULTIPART_FORM_DATA;

/// Bounds applied while decoding an inbound body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimits {
    /// Maximum total body size for JSON and form bodies.
    pub max_body_size: usize,
    pub max_attachments: usize,
    pub max_attachment_size: usize,
    pub max_fields: usize,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_body_size: 60 * 1024 * 1024,
            max_attachments: 5,
            max_attachment_size: 10 * 1024 * 1024,
            max_fields: 20,
        }
    }
}

impl From<&crate::config::Config> for BodyLimits {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            max_body_size: config.max_request_body_size,
            max_attachments: config.max_attachments,
            max_attachment_size: config.max_attachment_size,
            max_fields: config.max_fields,
        }
    }
}

/// Wire representation of a relayed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyCodec {
    Json,
    UrlEncoded,
    Multipart,
}

impl BodyCodec {
    /// Select the codec for an inbound `Content-Type` value.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let essence = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();

        match essence.as_str() {
            "application/x-www-form-urlencoded" => BodyCodec::UrlEncoded,
            "multipart/form-data" => BodyCodec::Multipart,
            _ => BodyCodec::Json,
        }
    }

    /// `Content-Type` used for the outbound request.
    ///
    /// For multipart this is the bare media type; the transport appends the
    /// boundary of the body it actually builds.
    pub fn content_type(&self) -> &'static str {
        match self {
            BodyCodec::Json => "application/json",
            BodyCodec::UrlEncoded => "application/x-www-form-urlencoded",
            BodyCodec::Multipart => MULTIPART_FORM_DATA,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BodyCodec::Json => "json",
            BodyCodec::UrlEncoded => "form",
            BodyCodec::Multipart => "multipart",
        }
    }

    /// Decode an inbound request body.
    ///
    /// JSON and form bodies never fail to decode: malformed input becomes an
    /// empty body. Only size limits and broken multipart streams are errors.
    ///
    /// # Errors
    ///
    /// - `AppError::SizeLimitExceeded` if any limit in `limits` is exceeded
    /// - `AppError::InvalidInput` if a multipart body cannot be read
    pub async fn decode(&self, request: Request, limits: &BodyLimits) -> AppResult<CanonicalBody> {
        match self {
            BodyCodec::Multipart => multipart::decode(request, limits).await,
            BodyCodec::Json => Ok(json::decode(&read_body(request.into_body(), limits).await?)),
            BodyCodec::UrlEncoded => {
                Ok(form::decode(&read_body(request.into_body(), limits).await?))
            }
        }
    }

    /// Encode a canonical body for the destination.
    pub fn encode(&self, body: &CanonicalBody) -> AppResult<OutboundBody> {
        match self {
            BodyCodec::Json => {
                if !body.attachments.is_empty() {
                    warn!(
                        count = body.attachments.len(),
                        "Attachments cannot be sent as JSON, dropping them"
                    );
                }
                Ok(OutboundBody::Bytes(json::encode(body)?))
            }
            BodyCodec::UrlEncoded => Ok(OutboundBody::Bytes(form::encode(body))),
            BodyCodec::Multipart => Ok(OutboundBody::Multipart(body.clone())),
        }
    }
}

/// Buffer a request body up to the configured limit.
async fn read_body(body: Body, limits: &BodyLimits) -> AppResult<Bytes> {
    axum::body::to_bytes(body, limits.max_body_size)
        .await
        .map_err(|e| {
            let inner = match e.into_inner().downcast::<axum::Error>() {
                Ok(err) => err.into_inner(),
                Err(err) => err,
            };
            if inner.is::<http_body_util::LengthLimitError>() {
                AppError::SizeLimitExceeded(format!(
                    "request body exceeds {} bytes",
                    limits.max_body_size
                ))
            } else {
                AppError::InvalidInput(format!("failed to read request body: {inner}"))
            }
        })
}
