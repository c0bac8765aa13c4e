//! Shared application state for Axum handlers.
//!
//! The relay keeps no per-request or cross-request mutable state. The state
//! only bundles immutable configuration and the relay pipeline, both cheap to
//! clone into every handler.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::AppResult;
use crate::services::RelayService;
use crate::transport::{HttpTransport, Transport};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// The relay pipeline
    pub relay: RelayService,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    /// Create state with the HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the HTTP client cannot be built.
    pub fn new(config: Config) -> AppResult<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create state around any transport (used by tests with stubs).
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        let relay = RelayService::new(&config, transport);
        Self {
            config: Arc::new(config),
            relay,
            started_at: Instant::now(),
        }
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
