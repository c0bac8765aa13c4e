mod body;
mod directive;
mod envelope;
mod outcome;

pub use body::{Attachment, CanonicalBody, FieldValue, PAYLOAD_FIELD};
pub use directive::{
    AUTH_SOURCES, CUSTOM_HEADER_PREFIX, DEFAULT_TIMEOUT_MS, DESTINATION_SOURCES, DirectiveSource,
    FallbackDirective, HEADERS_FIELD, MAX_TIMEOUT_MS, METHOD_HEADER, RelayDirective, RelayTimeout,
    TIMEOUT_SOURCES, reserved_body_fields,
};
pub use envelope::{ForwardedFile, HealthResponse, RelayEnvelope};
pub use outcome::{
    OutboundBody, OutboundRequest, RelayResult, TransportFailure, TransportFailureKind,
    UpstreamResponse, ValidationFailure,
};
