use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed-shape JSON document returned to the caller on every path.
///
/// `success`, `status`, `data` and `error` are the stable contract. The rest
/// are diagnostics and may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    /// True only when the destination replied with a 2xx status.
    pub success: bool,
    /// Status code returned by the destination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Destination body: parsed JSON when declared as JSON, otherwise text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Machine-readable failure code (e.g. `timeout`, `forbidden_destination`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Time spent waiting on the destination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// The destination the request was relayed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Selected destination response headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Attachments forwarded in multipart mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<ForwardedFile>>,
    /// Names of the body fields that were forwarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl RelayEnvelope {
    /// Envelope for a relay-side failure (nothing received from the destination).
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(code.into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Summary of one forwarded attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardedFile {
    pub name: String,
    pub filename: String,
    pub size: usize,
    pub mime_type: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" while the process serves requests)
    pub status: String,
    /// Service version
    pub version: String,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}
