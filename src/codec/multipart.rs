use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;
use bytes::BytesMut;
use tracing::{debug, warn};

use super::BodyLimits;
use crate::error::{AppError, AppResult};
use crate::models::{Attachment, CanonicalBody};

/// Media type of multipart bodies, without the boundary parameter.
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

const DEFAULT_ATTACHMENT_MIME: &str = "application/octet-stream";

/// Decode a multipart body into fields and attachments.
///
/// Parts carrying a file name become attachments; all other parts are text
/// fields. The whole body is rejected as soon as any bound is crossed.
pub async fn decode(request: Request, limits: &BodyLimits) -> AppResult<CanonicalBody> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;

    let mut body = CanonicalBody::default();
    let mut field_count = 0usize;

    while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            warn!("Skipping multipart part without a name");
            continue;
        };

        if let Some(file_name) = field.file_name().map(str::to_string) {
            if body.attachments.len() >= limits.max_attachments {
                return Err(AppError::SizeLimitExceeded(format!(
                    "more than {} attachments",
                    limits.max_attachments
                )));
            }
            let mime_type = field
                .content_type()
                .unwrap_or(DEFAULT_ATTACHMENT_MIME)
                .to_string();
            let bytes = read_attachment(field, &file_name, limits.max_attachment_size).await?;

            debug!(field = %name, file = %file_name, size = bytes.len(), "Decoded attachment");
            body.attachments.push(Attachment {
                field_name: name,
                file_name,
                mime_type,
                bytes,
            });
        } else {
            field_count += 1;
            if field_count > limits.max_fields {
                return Err(AppError::SizeLimitExceeded(format!(
                    "more than {} form fields",
                    limits.max_fields
                )));
            }
            let value = field.text().await.map_err(map_multipart_error)?;
            body.push_text(name, value);
        }
    }

    Ok(body)
}

/// Read one attachment, failing once it grows past `max_size`.
async fn read_attachment(
    mut field: Field<'_>,
    file_name: &str,
    max_size: usize,
) -> AppResult<bytes::Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(map_multipart_error)? {
        if buffer.len() + chunk.len() > max_size {
            return Err(AppError::SizeLimitExceeded(format!(
                "attachment '{file_name}' exceeds {max_size} bytes"
            )));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

fn map_multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::SizeLimitExceeded(e.body_text())
    } else {
        AppError::InvalidInput(format!("malformed multipart body: {}", e.body_text()))
    }
}
