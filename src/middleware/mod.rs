//! HTTP middleware for correlation and forwarding context.
//!
//! - **Request ID**: generation, sanitization and propagation of
//!   `X-Request-Id`, also forwarded to destinations
//! - **Client address**: `X-Forwarded-For` chain construction for outbound
//!   requests
//!
//! CORS, tracing, body limits and panic recovery come from `tower-http` and
//! axum and are wired in `routes`.

pub mod ip;
pub mod request_id;

pub use ip::{UNKNOWN_IP, extract_client_ip, forwarded_for_chain, peer_addr};
pub use request_id::{REQUEST_ID_HEADER, RequestIdExt, RequestIdLayer};
