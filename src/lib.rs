//! # Webhook Relay
//!
//! A stateless HTTP forwarding relay. It accepts a JSON, form-encoded or
//! multipart request, works out where the caller wants it delivered,
//! rebuilds the request against that destination and relays the reply back
//! inside a fixed-shape JSON envelope. Browser clients use it to reach
//! webhook endpoints they cannot call directly because of CORS.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → CORS → Catch Panic)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (relay, usage, health)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RelayService                                               │
//! │    Normalizer → DestinationPolicy → Composer → Translator   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transport (reqwest, redirects disabled, cancellable)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use webhook_relay::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let addr: SocketAddr = config.server_addr().parse()?;
//!     let app = build_router(AppState::new(config)?);
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Relaying
//!
//! ```bash
//! curl -X POST http://localhost:3000/relay \
//!      -H "X-Webhook-URL: https://hooks.example/in" \
//!      -H "X-Webhook-Auth: s3cret" \
//!      -H "Content-Type: application/json" \
//!      -d '{"payload": {"event": "signup"}}'
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod transport;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::{Config, StatusMode};
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
pub use transport::{HttpTransport, Transport};
pub use validation::DestinationPolicy;
