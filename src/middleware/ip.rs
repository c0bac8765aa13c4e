//! Caller address extraction for forwarding-context headers.
//!
//! The relay tells destinations who it is relaying for through
//! `X-Forwarded-For`. The inbound chain is kept as sent and the address of
//! the directly connected peer is appended, the way a reverse proxy does it.
//!
//! # Trust
//!
//! **Inbound proxy headers are client-controlled.** They are forwarded for
//! context only and never used for any decision inside the relay.
//!
//! # Internal Architecture
//!
//! ```text
//!              ┌──────────────────────────┐
//!              │  extract_ip_from_headers │ ← borrowed, no allocations
//!              └───────────┬──────────────┘
//!                          │
//!          ┌───────────────┴──────────────┐
//!          ▼                              ▼
//!  ┌───────────────────┐       ┌──────────────────────┐
//!  │ extract_client_ip │       │ forwarded_for_chain  │
//!  │ (logging)         │       │ (outbound header)    │
//!  └───────────────────┘       └──────────────────────┘
//! ```

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

/// Fallback value when no client address can be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Where a client address was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractedIp<'a> {
    /// First entry of `X-Forwarded-For`.
    FromXff(&'a str),
    /// `X-Real-IP` header.
    FromRealIp(&'a str),
    NotFound,
}

#[inline]
fn extract_ip_from_headers<B>(req: &Request<B>) -> ExtractedIp<'_> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next()
        && !first_ip.trim().is_empty()
    {
        return ExtractedIp::FromXff(first_ip.trim());
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return ExtractedIp::FromRealIp(value.trim());
    }

    ExtractedIp::NotFound
}

/// Address of the directly connected peer, when the server was started
/// with connection info.
pub fn peer_addr<B>(req: &Request<B>) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Best guess at the original client address, for logs.
///
/// Checks `X-Forwarded-For`, then `X-Real-IP`, then the peer address.
pub fn extract_client_ip<B>(req: &Request<B>) -> Cow<'static, str> {
    match extract_ip_from_headers(req) {
        ExtractedIp::FromXff(ip) | ExtractedIp::FromRealIp(ip) => Cow::Owned(ip.to_string()),
        ExtractedIp::NotFound => peer_addr(req)
            .map(|addr| Cow::Owned(addr.ip().to_string()))
            .unwrap_or(Cow::Borrowed(UNKNOWN_IP)),
    }
}

/// `X-Forwarded-For` value for the outbound request.
///
/// The inbound chain (or `X-Real-IP` when there is no chain) followed by the
/// peer address. `None` when nothing is known.
pub fn forwarded_for_chain<B>(req: &Request<B>) -> Option<String> {
    let inbound = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|chain| !chain.is_empty())
        .map(str::to_string)
        .or_else(|| match extract_ip_from_headers(req) {
            ExtractedIp::FromRealIp(ip) => Some(ip.to_string()),
            _ => None,
        });
    let peer = peer_addr(req).map(|addr| addr.ip().to_string());

    match (inbound, peer) {
        (Some(chain), Some(peer)) => Some(format!("{chain}, {peer}")),
        (Some(chain), None) => Some(chain),
        (None, peer) => peer,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn with_peer(mut req: Request<Body>, addr: &str) -> Request<Body> {
        req.extensions_mut()
            .insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn test_extract_ip_from_xff() {
        let req = Request::builder()
            .header("x-forwarded-for", "192.168.1.1, 10.0.0.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_client_ip(&req), "192.168.1.1");
    }

    #[test]
    fn test_extract_ip_xff_priority_over_real_ip() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1")
            .header("x-real-ip", "192.168.1.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_client_ip(&req), "10.0.0.1");
    }

    #[test]
    fn test_extract_ip_falls_back_to_peer() {
        let req = with_peer(Request::builder().body(Body::empty()).unwrap(), "198.51.100.7:5000");
        assert_eq!(extract_client_ip(&req), "198.51.100.7");
    }

    #[test]
    fn test_extract_ip_unknown_is_borrowed() {
        let req = Request::builder().body(Body::empty()).unwrap();

        let ip = extract_client_ip(&req);
        assert_eq!(ip, UNKNOWN_IP);
        assert!(matches!(ip, Cow::Borrowed(_)));
    }

    #[test]
    fn test_extract_ip_blank_xff_uses_real_ip() {
        let req = Request::builder()
            .header("x-forwarded-for", "   ")
            .header("x-real-ip", "203.0.113.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_client_ip(&req), "203.0.113.1");
    }

    #[test]
    fn test_forwarded_for_appends_peer() {
        let req = with_peer(
            Request::builder()
                .header("x-forwarded-for", "203.0.113.50, 70.41.3.18")
                .body(Body::empty())
                .unwrap(),
            "10.1.2.3:40000",
        );

        assert_eq!(
            forwarded_for_chain(&req).as_deref(),
            Some("203.0.113.50, 70.41.3.18, 10.1.2.3")
        );
    }

    #[test]
    fn test_forwarded_for_peer_only() {
        let req = with_peer(Request::builder().body(Body::empty()).unwrap(), "[2001:db8::1]:443");
        assert_eq!(forwarded_for_chain(&req).as_deref(), Some("2001:db8::1"));
    }

    #[test]
    fn test_forwarded_for_without_peer_keeps_chain() {
        let req = Request::builder()
            .header("x-real-ip", "203.0.113.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(forwarded_for_chain(&req).as_deref(), Some("203.0.113.1"));
    }

    #[test]
    fn test_forwarded_for_nothing_known() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(forwarded_for_chain(&req), None);
    }
}
