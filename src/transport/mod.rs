//! Outbound transport: the only place the relay touches the network.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────┐   OutboundRequest    ┌───────────────────┐
//! │  RelayService          │ ───────────────────▶ │  dyn Transport    │
//! │  (timeout + cancel)    │ ◀─────────────────── │  HttpTransport    │
//! └────────────────────────┘  UpstreamResponse /  └───────────────────┘
//!                              TransportFailure
//! ```
//!
//! The service arms the deadline and owns the `CancellationToken`; a
//! transport must stop work and release its connection as soon as the token
//! is cancelled.

mod client;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::models::{OutboundRequest, TransportFailure, UpstreamResponse};

pub use client::HttpTransport;

/// Sends one composed request to its destination.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a single attempt. Any received status, including 4xx and 5xx,
    /// is `Ok`; only failures to obtain a response are `Err`.
    async fn send(
        &self,
        request: OutboundRequest,
        cancel: CancellationToken,
    ) -> Result<UpstreamResponse, TransportFailure>;
}
